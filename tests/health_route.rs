use std::sync::Arc;

use inbox_rag_server::models::HealthResponse;
use inbox_rag_server::routes;
use inbox_rag_server::test_support::{test_app_state, FakeRelationalStore, TestRocketBuilder};
use rocket::http::Status;
use rocket::routes;

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let relational: Arc<dyn inbox_rag_server::persistence::RelationalStore> = Arc::new(FakeRelationalStore::new());
    let state = test_app_state(relational);

    let client = TestRocketBuilder::new()
        .mount_routes("/", routes![routes::health::health])
        .build()
        .manage(state);

    let client = rocket::local::asynchronous::Client::tracked(client)
        .await
        .expect("valid rocket instance");

    let response = client.get("/health").dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    let body: HealthResponse = response.into_json().await.expect("valid JSON body");
    assert_eq!(body.status, "ok");
    assert!(!body.background_thread_alive);
}
