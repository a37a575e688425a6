//! Data transfer objects and relational row types exposed by the API.
//!
//! Every struct derives `JsonSchema` so `rocket_okapi` can describe the
//! payloads accurately in the generated OpenAPI document.

use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::FromRow;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A registered account. Credentials are opaque to the core; they are
/// refreshed and verified by the external OAuth collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct User {
    pub user_id: i32,
    pub external_account_id: String,
    pub email_address: String,
    #[serde(skip_serializing)]
    pub access_credential: String,
    #[serde(skip_serializing)]
    pub refresh_credential: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single inbox message persisted in the relational store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Message {
    pub message_id: i32,
    pub user_id: i32,
    pub provider_message_id: String,
    pub sender: String,
    pub subject: String,
    pub snippet: String,
    pub body: String,
    pub date: DateTime<Utc>,
    /// Stored as a comma-joined string at the row boundary; see
    /// [`Message::labels_vec`] for the typed view.
    pub labels: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn labels_vec(&self) -> Vec<String> {
        self.labels
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn labels_from_vec(labels: &[String]) -> String {
        labels.join(",")
    }

    pub fn has_inbox_label(&self) -> bool {
        self.labels_vec().iter().any(|l| l == "INBOX")
    }
}

/// Typed metadata carried by every vector chunk. Kept strictly typed in
/// Rust; coerced to provider-required string forms only at the vector
/// store boundary, never in this type.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChunkMetadata {
    pub message_id: i32,
    pub sender: String,
    pub subject: String,
    pub date: DateTime<Utc>,
    pub timestamp: i64,
    pub is_read: bool,
    pub is_urgent: bool,
    pub has_deadline: bool,
    pub deadline_date: Option<DateTime<Utc>>,
    pub chunk_index: u32,
}

/// A retrieved or about-to-be-indexed chunk of message text.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VectorChunk {
    pub chunk_id: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub document_text: String,
    pub metadata: ChunkMetadata,
}

/// Current lifecycle status of a user's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    Idle,
    Indexing,
    Ready,
    Error,
    RateLimited,
}

/// Snapshot of a user's index state, merged with vector-store stats for
/// the public status/stats endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexStateView {
    pub status: IndexStatus,
    pub is_ready: bool,
    pub is_indexing: bool,
    pub attempt: u32,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub emails_indexed: u64,
    pub new_emails: u64,
    pub last_error: Option<String>,
    pub total_chunks: u64,
    pub cache_size: usize,
    pub cache_ttl_seconds: u64,
    pub rate_limited: bool,
    pub label_filter: String,
}

/// A single source citation returned from `/ask`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Source {
    pub email_id: i32,
    pub sender: String,
    pub subject: String,
    pub date: DateTime<Utc>,
    pub relevance: f32,
    pub is_urgent: bool,
    pub has_deadline: bool,
    pub deadline: String,
    pub text: String,
    pub timestamp: i64,
}

/// Request body of `POST /ask`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AskRequest {
    pub question: String,
}

/// Outcome discriminant of an `/ask` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AskStatus {
    Ok,
    NoResults,
    Indexing,
    Error,
    RateLimited,
}

/// Response body of `POST /ask`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub status: AskStatus,
    pub emails_found: usize,
    pub matched_keywords: Vec<String>,
    pub is_ready: bool,
}

/// Response body of `GET /email/list`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EmailListResponse {
    pub emails: Vec<EmailSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EmailSummary {
    pub id: i32,
    pub sender: String,
    pub subject: String,
    pub snippet: String,
    pub body: String,
    pub date: DateTime<Utc>,
    pub is_read: bool,
}

/// Request body of `POST /email/send`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SendEmailRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SendEmailResponse {
    pub id: String,
}

/// Response body of `POST /index`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexQueuedResponse {
    pub status: String,
    pub message: String,
}

/// Response body of `GET /admin/status`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AdminStatusResponse {
    pub user: String,
    pub database: DatabaseCounts,
    pub rag: IndexStateView,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DatabaseCounts {
    pub total: i64,
    pub unread: i64,
    pub read: i64,
}

/// Response body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthResponse {
    pub status: String,
    pub rag_initialized: bool,
    pub background_thread_alive: bool,
    pub cache_size: usize,
}
