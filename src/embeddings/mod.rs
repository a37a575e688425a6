//! Embedding model contract and its default HTTP adapter.
//!
//! The embedding model itself is an external collaborator; this module
//! defines the trait the core retrieval/indexing subsystems consume and a
//! thin `reqwest`-backed default implementation (timeout + bounded retry +
//! backoff), in the shape of the embeddings client used elsewhere in this
//! codebase for HTTP-served model endpoints.

use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};

const EMBEDDING_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const EMBEDDING_MAX_RETRIES: usize = 3;
const EMBEDDING_RETRY_BACKOFF_MS: u64 = 750;
const EMBEDDING_RETRY_BACKOFF_FACTOR: u64 = 2;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("embedding service returned no vectors")]
    Empty,
    #[error("embedding request timed out after {0:?}")]
    Timeout(Duration),
}

impl EmbeddingError {
    fn status(status: StatusCode, body: String) -> Self {
        EmbeddingError::Status { status, body }
    }
}

#[rocket::async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

#[derive(Debug, Clone)]
pub struct HttpEmbeddingClient {
    base_url: String,
    http: Client,
}

impl HttpEmbeddingClient {
    pub fn new(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    async fn dispatch(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        #[derive(Serialize)]
        struct EmbeddingRequest<'a> {
            inputs: &'a [&'a str],
        }

        #[derive(Serialize)]
        struct OpenAiCompatibleRequest<'a> {
            input: &'a [&'a str],
        }

        let url = format!("{}/embeddings", self.base_url);
        let payload = EmbeddingRequest { inputs: &[text] };

        let primary = self.http.post(&url).json(&payload).send().await?;

        if primary.status().is_success() {
            return Self::parse_response(primary).await;
        }

        let status = primary.status();
        let body = primary
            .text()
            .await
            .unwrap_or_else(|_| "failed to read error body".to_string());

        if status == StatusCode::UNPROCESSABLE_ENTITY && body.contains("missing field `input`") {
            let fallback_payload = OpenAiCompatibleRequest { input: &[text] };
            let fallback = self.http.post(&url).json(&fallback_payload).send().await?;

            if fallback.status().is_success() {
                return Self::parse_response(fallback).await;
            }

            let fallback_status = fallback.status();
            let fallback_body = fallback
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(EmbeddingError::status(fallback_status, fallback_body));
        }

        Err(EmbeddingError::status(status, body))
    }

    async fn parse_response(response: reqwest::Response) -> Result<Vec<f32>, EmbeddingError> {
        let parsed: EmbeddingResponse = response.json().await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or(EmbeddingError::Empty)
    }
}

#[rocket::async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut backoff_ms = EMBEDDING_RETRY_BACKOFF_MS;
        for attempt in 1..=EMBEDDING_MAX_RETRIES {
            debug!(
                "embeddings: dispatching request (attempt {} of {})",
                attempt, EMBEDDING_MAX_RETRIES
            );

            match timeout(EMBEDDING_REQUEST_TIMEOUT, self.dispatch(text)).await {
                Ok(Ok(vector)) => return Ok(vector),
                Ok(Err(err)) => {
                    warn!("embeddings: request attempt {} failed: {}", attempt, err);
                    if attempt == EMBEDDING_MAX_RETRIES {
                        return Err(err);
                    }
                }
                Err(_) => {
                    warn!(
                        "embeddings: request attempt {} timed out after {:?}",
                        attempt, EMBEDDING_REQUEST_TIMEOUT
                    );
                    if attempt == EMBEDDING_MAX_RETRIES {
                        return Err(EmbeddingError::Timeout(EMBEDDING_REQUEST_TIMEOUT));
                    }
                }
            }

            sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms = backoff_ms.saturating_mul(EMBEDDING_RETRY_BACKOFF_FACTOR);
        }

        Err(EmbeddingError::Timeout(EMBEDDING_REQUEST_TIMEOUT))
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}
