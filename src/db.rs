use rocket_db_pools::{Database, sqlx};

#[derive(Database)]
#[database("inbox_rag_db")]
pub struct InboxDb(sqlx::PgPool);
