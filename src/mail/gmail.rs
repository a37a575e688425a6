//! Default [`MailProvider`] adapter: Gmail's REST API.
//!
//! `users.messages.list` (filtered by label and, when a watermark
//! exists, `after:<unix-seconds>` in the search query) for discovery,
//! `users.messages.get?format=raw` for the full base64url-encoded
//! RFC822 payload `mail::parser` decodes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{MailError, MailProvider, RawMessage};

const API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

pub struct GmailProvider {
    http: Client,
    access_token: String,
}

impl GmailProvider {
    pub fn new(http: Client, access_token: impl Into<String>) -> Self {
        Self {
            http,
            access_token: access_token.into(),
        }
    }

    fn map_status(status: StatusCode, body: String) -> MailError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            MailError::RateLimited
        } else {
            MailError::Provider(format!("gmail returned {status}: {body}"))
        }
    }
}

#[derive(Deserialize)]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Deserialize)]
struct RawMessagePayload {
    id: String,
    raw: String,
    #[serde(rename = "labelIds", default)]
    label_ids: Vec<String>,
}

#[derive(Serialize)]
struct SendMessagePayload {
    raw: String,
}

#[derive(Deserialize)]
struct SendMessageResponse {
    id: String,
}

#[rocket::async_trait]
impl MailProvider for GmailProvider {
    async fn list_message_ids(
        &self,
        label: &str,
        after: Option<DateTime<Utc>>,
        cap: u32,
    ) -> Result<Vec<String>, MailError> {
        let mut query = format!("label:{label}");
        if let Some(after) = after {
            query.push_str(&format!(" after:{}", after.timestamp()));
        }

        let response = self
            .http
            .get(format!("{API_BASE}/messages"))
            .bearer_auth(&self.access_token)
            .query(&[("q", query.as_str()), ("maxResults", &cap.to_string())])
            .send()
            .await
            .map_err(|e| MailError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, body));
        }

        let parsed: ListMessagesResponse = response
            .json()
            .await
            .map_err(|e| MailError::Provider(e.to_string()))?;

        Ok(parsed.messages.into_iter().map(|m| m.id).collect())
    }

    async fn fetch_raw_message(&self, provider_message_id: &str) -> Result<RawMessage, MailError> {
        let response = self
            .http
            .get(format!("{API_BASE}/messages/{provider_message_id}"))
            .bearer_auth(&self.access_token)
            .query(&[("format", "raw")])
            .send()
            .await
            .map_err(|e| MailError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, body));
        }

        let parsed: RawMessagePayload = response
            .json()
            .await
            .map_err(|e| MailError::Provider(e.to_string()))?;

        Ok(RawMessage {
            provider_message_id: parsed.id,
            label_ids: parsed.label_ids,
            raw_base64url: parsed.raw,
        })
    }

    async fn send_message(&self, to: &str, subject: &str, body: &str) -> Result<String, MailError> {
        let rfc822 = format!("To: {to}\r\nSubject: {subject}\r\nContent-Type: text/plain; charset=UTF-8\r\n\r\n{body}");
        let raw = URL_SAFE_NO_PAD.encode(rfc822);

        let response = self
            .http
            .post(format!("{API_BASE}/messages/send"))
            .bearer_auth(&self.access_token)
            .json(&SendMessagePayload { raw })
            .send()
            .await
            .map_err(|e| MailError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, body));
        }

        let parsed: SendMessageResponse = response
            .json()
            .await
            .map_err(|e| MailError::Provider(e.to_string()))?;

        Ok(parsed.id)
    }
}
