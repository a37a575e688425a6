//! `GET /email/list` and `POST /email/send` — direct inbox access
//! alongside the RAG surface, for clients that want the raw messages
//! or need to fire off a reply.

use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::mail::gmail::GmailProvider;
use crate::mail::MailProvider;
use crate::models::{EmailListResponse, EmailSummary, SendEmailRequest, SendEmailResponse};
use crate::state::AppState;

const DEFAULT_MAX_RESULTS: i64 = 50;

#[openapi(tag = "Email")]
#[get("/email/list?<max_results>")]
pub async fn list_emails(
    user: AuthUser,
    max_results: Option<i64>,
    state: &State<AppState>,
) -> Result<Json<EmailListResponse>, ApiError> {
    let limit = max_results.unwrap_or(DEFAULT_MAX_RESULTS).clamp(1, 500);

    let messages = state
        .relational
        .list_inbox_messages(user.user_id, limit, 0)
        .await?;

    let emails: Vec<EmailSummary> = messages
        .into_iter()
        .map(|m| EmailSummary {
            id: m.message_id,
            sender: m.sender,
            subject: m.subject,
            snippet: m.snippet,
            body: m.body,
            date: m.date,
            is_read: m.is_read,
        })
        .collect();

    Ok(Json(EmailListResponse {
        count: emails.len(),
        emails,
    }))
}

#[openapi(tag = "Email")]
#[post("/email/send", data = "<body>")]
pub async fn send_email(
    user: AuthUser,
    body: Json<SendEmailRequest>,
    state: &State<AppState>,
) -> Result<Json<SendEmailResponse>, ApiError> {
    if body.to.trim().is_empty() || !body.to.contains('@') {
        return Err(ApiError::BadRequest("recipient address is malformed".to_string()));
    }

    let account = state
        .relational
        .get_user(user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    let provider: Arc<dyn MailProvider> =
        Arc::new(GmailProvider::new(state.http.clone(), account.access_credential.clone()));

    let id = provider
        .send_message(&body.to, &body.subject, &body.body)
        .await
        .map_err(|e| {
            log::error!("send_message failed for user {}: {}", user.user_id, e);
            ApiError::InternalError("Failed to send message".to_string())
        })?;

    Ok(Json(SendEmailResponse { id }))
}
