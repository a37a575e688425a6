//! `POST /index` — queue a (re)index run without blocking the request.

use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{IndexQueuedResponse, User};
use crate::state::AppState;

#[openapi(tag = "Index")]
#[post("/index")]
pub async fn trigger_index(
    user: AuthUser,
    state: &State<AppState>,
) -> Result<Json<IndexQueuedResponse>, ApiError> {
    let account: User = state
        .relational
        .get_user(user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    state.ensure_polling(&account);
    state.lifecycle.request_index(user.user_id);

    Ok(Json(IndexQueuedResponse {
        status: "queued".to_string(),
        message: "Indexing started in background".to_string(),
    }))
}
