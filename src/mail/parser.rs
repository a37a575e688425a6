//! Header/body extraction from a provider's raw message bytes.
//!
//! Ground rule from the provider contract: bodies arrive base64url-encoded,
//! the way Gmail's `format=raw` responses are; MIME structure underneath is
//! parsed with `mailparse`, mirroring the approach used for git-mirrored
//! mail elsewhere in this codebase.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use mailparse::{MailHeaderMap, parse_mail};
use thiserror::Error;

use crate::mail::RawMessage;

#[derive(Debug, Clone)]
pub struct ParsedMessage {
    pub sender: String,
    pub subject: String,
    pub date: DateTime<Utc>,
    pub body: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ParseMessageError {
    #[error("invalid base64url payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to parse MIME structure: {0}")]
    Mime(#[from] mailparse::MailParseError),
}

fn sanitize_text(text: &str) -> String {
    text.replace('\0', "").trim().to_string()
}

/// Extract the plaintext body, preferring a `text/plain` part over the
/// message root (which may be HTML-only on a multipart message).
fn extract_body(parsed: &mailparse::ParsedMail) -> String {
    if parsed.subparts.is_empty() {
        return parsed.get_body().unwrap_or_default();
    }

    for part in &parsed.subparts {
        if part.ctype.mimetype == "text/plain" {
            return part.get_body().unwrap_or_default();
        }
    }

    parsed.get_body().unwrap_or_default()
}

/// Parse a raw provider message into header/body fields.
///
/// Date parsing falls back to the current time (logged) when the `Date`
/// header is missing or unparseable, per the ingestion cycle's tolerance
/// for incomplete upstream metadata.
pub fn parse_raw_message(raw: &RawMessage) -> Result<ParsedMessage, ParseMessageError> {
    let bytes = URL_SAFE_NO_PAD.decode(raw.raw_base64url.trim())?;
    let parsed = parse_mail(&bytes)?;

    let subject = parsed
        .headers
        .get_first_value("Subject")
        .map(|s| sanitize_text(&s))
        .unwrap_or_default();

    let sender = parsed
        .headers
        .get_first_value("From")
        .map(|s| sanitize_text(&s))
        .unwrap_or_default();

    let date = parsed
        .headers
        .get_first_value("Date")
        .and_then(|raw_date| DateTime::parse_from_rfc2822(raw_date.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| {
            log::warn!(
                "message {} missing or unparseable Date header, using current time",
                raw.provider_message_id
            );
            Utc::now()
        });

    let body = sanitize_text(&extract_body(&parsed));

    Ok(ParsedMessage {
        sender,
        subject,
        date,
        body,
        labels: raw.label_ids.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_with(body: &str, date: &str) -> RawMessage {
        let mime = format!(
            "Subject: Hello\r\nFrom: Alice <alice@example.com>\r\nDate: {}\r\n\r\n{}\r\n",
            date, body
        );
        RawMessage {
            provider_message_id: "m1".to_string(),
            label_ids: vec!["INBOX".to_string()],
            raw_base64url: URL_SAFE_NO_PAD.encode(mime.as_bytes()),
        }
    }

    #[test]
    fn parses_headers_and_body() {
        let raw = raw_with("hi there", "Mon, 1 Jan 2024 10:00:00 +0000");
        let parsed = parse_raw_message(&raw).unwrap();
        assert_eq!(parsed.subject, "Hello");
        assert_eq!(parsed.sender, "Alice <alice@example.com>");
        assert_eq!(parsed.body, "hi there");
        assert_eq!(parsed.date.to_rfc3339(), "2024-01-01T10:00:00+00:00");
    }

    #[test]
    fn falls_back_to_now_on_bad_date() {
        let raw = raw_with("hi", "not-a-date");
        let parsed = parse_raw_message(&raw).unwrap();
        assert!(parsed.date <= Utc::now());
    }

    #[test]
    fn rejects_invalid_base64() {
        let mut raw = raw_with("hi", "Mon, 1 Jan 2024 10:00:00 +0000");
        raw.raw_base64url = "not valid base64!!".to_string();
        assert!(parse_raw_message(&raw).is_err());
    }

    /// Gmail's `format=raw` payloads are unpadded base64url. A body length
    /// that would force `=` padding under the padded engine must still
    /// decode here, matching what `GmailProvider::send_message` produces.
    #[test]
    fn decodes_unpadded_base64url_with_no_trailing_equals() {
        let raw = raw_with("a body long enough to need padding", "Mon, 1 Jan 2024 10:00:00 +0000");
        assert!(!raw.raw_base64url.contains('='));
        let parsed = parse_raw_message(&raw).unwrap();
        assert_eq!(parsed.body, "a body long enough to need padding");
    }
}
