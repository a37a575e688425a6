//! `GET /status` and `GET /stats` — both return the index lifecycle
//! state merged with the query cache's current footprint; `/stats` is
//! the same view kept as a distinct path for dashboard polling.

use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::auth::AuthUser;
use crate::models::IndexStateView;
use crate::persistence::vector::collection_name;
use crate::state::AppState;

const INBOX_LABEL: &str = "INBOX";

/// Total indexed chunks for a user, read straight from the vector store.
/// A missing user or a backend hiccup degrades to `0` rather than failing
/// the whole status view, since this is a best-effort reporting field.
async fn total_chunks(state: &AppState, user_id: i32) -> u64 {
    let account = match state.relational.get_user(user_id).await {
        Ok(Some(account)) => account,
        Ok(None) => return 0,
        Err(err) => {
            log::warn!("failed to load user {} while building status view: {}", user_id, err);
            return 0;
        }
    };

    let collection = collection_name(&account.email_address);
    match state.vectors.count(&collection).await {
        Ok(count) => count,
        Err(err) => {
            log::warn!("failed to read chunk count for user {}: {}", user_id, err);
            0
        }
    }
}

pub async fn index_state_view(state: &AppState, user_id: i32) -> IndexStateView {
    let index_state = state.lifecycle.status(user_id);
    IndexStateView {
        status: index_state.status,
        is_ready: state.lifecycle.is_ready(user_id),
        is_indexing: index_state.status == crate::models::IndexStatus::Indexing,
        attempt: index_state.attempt,
        last_indexed_at: index_state.last_indexed_at,
        emails_indexed: index_state.emails_indexed,
        new_emails: index_state.new_emails,
        last_error: index_state.last_error,
        total_chunks: total_chunks(state, user_id).await,
        cache_size: state.query_cache.len(),
        cache_ttl_seconds: state.query_cache.ttl_seconds(),
        rate_limited: index_state.status == crate::models::IndexStatus::RateLimited,
        label_filter: INBOX_LABEL.to_string(),
    }
}

#[openapi(tag = "Status")]
#[get("/status")]
pub async fn status(user: AuthUser, state: &State<AppState>) -> Json<IndexStateView> {
    Json(index_state_view(state, user.user_id).await)
}

#[openapi(tag = "Status")]
#[get("/stats")]
pub async fn stats(user: AuthUser, state: &State<AppState>) -> Json<IndexStateView> {
    Json(index_state_view(state, user.user_id).await)
}
