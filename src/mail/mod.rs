//! Mail provider contract and ingestion poller.
//!
//! The mail-provider SDK itself (OAuth-scoped list/get/modify calls) is an
//! external collaborator; this module defines only the contract the core
//! consumes from it, plus the poller that drives ingestion.

pub mod gmail;
pub mod parser;
pub mod poller;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail provider request failed: {0}")]
    Provider(String),
    #[error("mail provider rate limited")]
    RateLimited,
}

/// A message as returned by the provider before header/body parsing: raw
/// RFC 5322 bytes (base64url-encoded, as Gmail's `format=raw` responses
/// are) plus the label set the provider already attached.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub provider_message_id: String,
    pub label_ids: Vec<String>,
    pub raw_base64url: String,
}

/// Operations the Mail Ingestion Poller needs from the provider.
///
/// Implementations are expected to scope every call to the authenticated
/// user's mailbox; this trait carries no credentials itself.
#[rocket::async_trait]
pub trait MailProvider: Send + Sync {
    /// List provider message ids restricted to `label`, optionally bounded
    /// to messages after `after` (day-granularity watermark), capped at
    /// `cap` results.
    async fn list_message_ids(
        &self,
        label: &str,
        after: Option<DateTime<Utc>>,
        cap: u32,
    ) -> Result<Vec<String>, MailError>;

    /// Fetch the full raw message for a single provider id.
    async fn fetch_raw_message(&self, provider_message_id: &str) -> Result<RawMessage, MailError>;

    /// Send a plaintext message, returning the provider's id for it.
    async fn send_message(&self, to: &str, subject: &str, body: &str) -> Result<String, MailError>;
}
