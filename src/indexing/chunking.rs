//! Message -> document text -> fixed-size chunks.

use chrono::{DateTime, Utc};

use crate::indexing::deadline;
use crate::models::{ChunkMetadata, Message, VectorChunk};

/// Build the text a message is indexed as: headers first, then body, so
/// sender/subject/date all participate in embedding and keyword scoring
/// even when the body itself doesn't mention them.
pub fn build_document_text(message: &Message) -> String {
    format!(
        "FROM: {}\nSUBJECT: {}\nDATE: {}\n\n{}",
        message.sender,
        message.subject,
        message.date.to_rfc3339(),
        message.body
    )
}

/// Split `text` into `chunk_size`-character slices. A message shorter
/// than the chunk size yields exactly one chunk.
fn chunk_text(text: &str, chunk_size: usize) -> Vec<(String, u32)> {
    if text.chars().count() <= chunk_size {
        return vec![(text.to_string(), 0)];
    }

    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, slice)| (slice.iter().collect(), i as u32))
        .collect()
}

/// Chunk one message into its vector-store-ready pieces, deriving
/// urgency/deadline flags once per message and sharing them across every
/// chunk (only `chunk_index` varies).
pub fn chunk_message(message: &Message, chunk_size: usize, now: DateTime<Utc>) -> Vec<VectorChunk> {
    let text = build_document_text(message);
    let text_lower = text.to_lowercase();

    let is_urgent = deadline::is_urgent(&text_lower);
    let has_deadline_flag = deadline::has_deadline(&text_lower);
    let deadline_date = deadline::extract_deadline(&text, now);

    chunk_text(&text, chunk_size)
        .into_iter()
        .map(|(chunk, chunk_index)| VectorChunk {
            chunk_id: format!("{}_{}", message.message_id, chunk_index),
            embedding: Vec::new(),
            document_text: chunk,
            metadata: ChunkMetadata {
                message_id: message.message_id,
                sender: message.sender.clone(),
                subject: message.subject.clone(),
                date: message.date,
                timestamp: message.date.timestamp(),
                is_read: message.is_read,
                is_urgent,
                has_deadline: has_deadline_flag,
                deadline_date,
                chunk_index,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_message(body: &str) -> Message {
        Message {
            message_id: 7,
            user_id: 1,
            provider_message_id: "abc".into(),
            sender: "alice@example.com".into(),
            subject: "Budget".into(),
            snippet: body.chars().take(50).collect(),
            body: body.to_string(),
            date: Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap(),
            labels: "INBOX".into(),
            is_read: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn short_message_yields_single_chunk() {
        let message = sample_message("please review the attached budget");
        let chunks = chunk_message(&message, 800, Utc::now());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_id, "7_0");
    }

    #[test]
    fn long_message_splits_and_shares_metadata() {
        let body = "x".repeat(2500);
        let message = sample_message(&body);
        let chunks = chunk_message(&message, 800, Utc::now());
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.chunk_index, i as u32);
            assert_eq!(chunk.metadata.message_id, 7);
            assert_eq!(chunk.metadata.sender, "alice@example.com");
        }
    }

    #[test]
    fn derives_urgency_and_deadline_flags() {
        let message = sample_message("URGENT: deadline is 08/01/2026");
        let chunks = chunk_message(&message, 800, Utc::now());
        assert!(chunks[0].metadata.is_urgent);
        assert!(chunks[0].metadata.has_deadline);
        assert!(chunks[0].metadata.deadline_date.is_some());
    }
}
