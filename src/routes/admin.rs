//! `GET /admin/status` — relational read counts merged with the index
//! lifecycle view, for dashboards and support debugging.

use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{AdminStatusResponse, DatabaseCounts};
use crate::state::AppState;

use super::status::index_state_view;

#[openapi(tag = "Admin")]
#[get("/admin/status")]
pub async fn admin_status(user: AuthUser, state: &State<AppState>) -> Result<Json<AdminStatusResponse>, ApiError> {
    let account = state
        .relational
        .get_user(user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    let (total, unread, read) = state.relational.read_counts(user.user_id).await?;

    Ok(Json(AdminStatusResponse {
        user: account.email_address,
        database: DatabaseCounts { total, unread, read },
        rag: index_state_view(state, user.user_id).await,
    }))
}
