//! Lightweight service health endpoint used for readiness checks and tests.

use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::models::HealthResponse;
use crate::state::AppState;

#[openapi(tag = "Health")]
#[get("/health")]
pub fn health(state: &State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        rag_initialized: true,
        background_thread_alive: state.lifecycle.is_worker_running(),
        cache_size: state.query_cache.len(),
    })
}
