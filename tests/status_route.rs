use std::sync::Arc;

use inbox_rag_server::models::{IndexStateView, IndexStatus, User};
use inbox_rag_server::routes;
use inbox_rag_server::test_support::{issue_test_token, test_app_state, test_auth_config, FakeRelationalStore, TestRocketBuilder};
use rocket::http::{Header, Status};
use rocket::routes;

fn sample_user() -> User {
    User {
        user_id: 7,
        external_account_id: "ext-7".to_string(),
        email_address: "bob@example.com".to_string(),
        access_credential: "fake-token".to_string(),
        refresh_credential: None,
        created_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn status_reports_idle_before_any_index_request() {
    let auth_config = test_auth_config();
    let token = issue_test_token(&auth_config, 7);
    let relational: Arc<dyn inbox_rag_server::persistence::RelationalStore> =
        Arc::new(FakeRelationalStore::new().with_user(sample_user()));
    let state = test_app_state(relational);

    let client = TestRocketBuilder::new()
        .mount_routes("/", routes![routes::status::status])
        .build()
        .manage(state)
        .manage(auth_config);

    let client = rocket::local::asynchronous::Client::tracked(client)
        .await
        .expect("valid rocket instance");

    let response = client
        .get("/status")
        .header(Header::new("Authorization", format!("Bearer {token}")))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);
    let body: IndexStateView = response.into_json().await.expect("valid JSON body");
    assert_eq!(body.status, IndexStatus::Idle);
    assert!(!body.is_ready);
    assert_eq!(body.label_filter, "INBOX");
}
