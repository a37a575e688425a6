use std::sync::Arc;

use inbox_rag_server::models::{AskResponse, AskStatus, User};
use inbox_rag_server::routes;
use inbox_rag_server::test_support::{issue_test_token, test_app_state, test_auth_config, FakeRelationalStore, TestRocketBuilder};
use rocket::http::{ContentType, Header, Status};
use rocket::routes;

fn sample_user() -> User {
    User {
        user_id: 1,
        external_account_id: "ext-1".to_string(),
        email_address: "alice@example.com".to_string(),
        access_credential: "fake-token".to_string(),
        refresh_credential: None,
        created_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn ask_gates_on_idle_index_and_enqueues() {
    let auth_config = test_auth_config();
    let token = issue_test_token(&auth_config, 1);
    let relational: Arc<dyn inbox_rag_server::persistence::RelationalStore> =
        Arc::new(FakeRelationalStore::new().with_user(sample_user()));
    let state = test_app_state(relational);

    let client = TestRocketBuilder::new()
        .mount_routes("/", routes![routes::ask::ask])
        .build()
        .manage(state)
        .manage(auth_config);

    let client = rocket::local::asynchronous::Client::tracked(client)
        .await
        .expect("valid rocket instance");

    let response = client
        .post("/ask")
        .header(ContentType::JSON)
        .header(Header::new("Authorization", format!("Bearer {token}")))
        .body(r#"{"question": "what did bob say about the budget?"}"#)
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);
    let body: AskResponse = response.into_json().await.expect("valid JSON body");
    assert_eq!(body.status, AskStatus::Indexing);
    assert!(!body.is_ready);
    assert!(body.sources.is_empty());
}

#[tokio::test]
async fn ask_rejects_empty_question() {
    let auth_config = test_auth_config();
    let token = issue_test_token(&auth_config, 1);
    let relational: Arc<dyn inbox_rag_server::persistence::RelationalStore> =
        Arc::new(FakeRelationalStore::new().with_user(sample_user()));
    let state = test_app_state(relational);

    let client = TestRocketBuilder::new()
        .mount_routes("/", routes![routes::ask::ask])
        .build()
        .manage(state)
        .manage(auth_config);

    let client = rocket::local::asynchronous::Client::tracked(client)
        .await
        .expect("valid rocket instance");

    let response = client
        .post("/ask")
        .header(ContentType::JSON)
        .header(Header::new("Authorization", format!("Bearer {token}")))
        .body(r#"{"question": "   "}"#)
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
}

#[tokio::test]
async fn ask_requires_bearer_token() {
    let auth_config = test_auth_config();
    let relational: Arc<dyn inbox_rag_server::persistence::RelationalStore> =
        Arc::new(FakeRelationalStore::new().with_user(sample_user()));
    let state = test_app_state(relational);

    let client = TestRocketBuilder::new()
        .mount_routes("/", routes![routes::ask::ask])
        .build()
        .manage(state)
        .manage(auth_config);

    let client = rocket::local::asynchronous::Client::tracked(client)
        .await
        .expect("valid rocket instance");

    let response = client
        .post("/ask")
        .header(ContentType::JSON)
        .body(r#"{"question": "anything"}"#)
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Unauthorized);
}
