#[macro_use]
extern crate rocket;

use inbox_rag_server::rocket;

#[launch]
fn launch() -> _ {
    rocket()
}
