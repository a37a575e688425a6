//! Chat-completion contract and its default HTTP adapter, plus the
//! deterministic fallback used when the LLM path is unavailable.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retrieval::scoring::ScoredChunk;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("llm service returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("llm rate limited")]
    RateLimited,
    #[error("llm returned no choices")]
    Empty,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[rocket::async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError>;
}

#[derive(Debug, Clone)]
pub struct HttpLlmClient {
    base_url: String,
    api_key: Option<String>,
    model: String,
    http: Client,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            http,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[rocket::async_trait]
impl LlmClient for HttpLlmClient {
    async fn chat(&self, messages: &[ChatMessage], temperature: f32, max_tokens: u32) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = ChatRequest {
            model: &self.model,
            messages,
            temperature,
            max_tokens,
        };

        let mut request = self.http.post(&url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            if body.to_lowercase().contains("rate_limit") {
                return Err(LlmError::RateLimited);
            }
            return Err(LlmError::Status { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or(LlmError::Empty)
    }
}

/// Render a deterministic answer without calling the LLM: full detail
/// for a single result, a newest-first numbered list for several.
pub fn fallback_answer(results: &[ScoredChunk]) -> String {
    if results.is_empty() {
        return "No relevant emails found.".to_string();
    }

    if results.len() == 1 {
        let item = &results[0];
        let body: String = item.document_text.chars().take(500).collect();
        return format!(
            "**{}**\nFrom: {}\nDate: {}\n\n{}",
            item.metadata.subject,
            item.metadata.sender,
            item.metadata.date.to_rfc3339(),
            body
        );
    }

    let mut parts = vec![format!("Found {} emails (newest first):\n", results.len())];
    for (i, item) in results.iter().take(10).enumerate() {
        let snippet: String = item.document_text.chars().take(200).collect();
        parts.push(format!(
            "{}. **{}** - From: {}\n   Date: {}\n   {}...\n",
            i + 1,
            item.metadata.subject,
            item.metadata.sender,
            item.metadata.date.to_rfc3339(),
            snippet
        ));
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use chrono::Utc;

    fn sample(subject: &str, timestamp: i64) -> ScoredChunk {
        ScoredChunk {
            chunk_id: "1_0".into(),
            document_text: "the quarterly budget needs review".into(),
            metadata: ChunkMetadata {
                message_id: 1,
                sender: "alice@example.com".into(),
                subject: subject.into(),
                date: Utc::now(),
                timestamp,
                is_read: true,
                is_urgent: false,
                has_deadline: false,
                deadline_date: None,
                chunk_index: 0,
            },
            hybrid_score: 0.5,
        }
    }

    #[test]
    fn fallback_for_no_results() {
        assert_eq!(fallback_answer(&[]), "No relevant emails found.");
    }

    #[test]
    fn fallback_single_result_shows_full_header() {
        let answer = fallback_answer(&[sample("Budget", 1)]);
        assert!(answer.contains("**Budget**"));
        assert!(answer.contains("From: alice@example.com"));
    }

    #[test]
    fn fallback_multi_result_is_numbered_list() {
        let answer = fallback_answer(&[sample("Budget", 2), sample("Travel", 1)]);
        assert!(answer.starts_with("Found 2 emails"));
        assert!(answer.contains("1. **Budget**"));
        assert!(answer.contains("2. **Travel**"));
    }
}
