//! Hybrid relevance scoring: blends vector-distance similarity with a
//! keyword-overlap signal and small boosts for urgency/deadline flags.
//!
//! The weighting shifts when a sender filter is active: a sender match
//! already narrows the candidate pool hard, so semantic similarity
//! matters relatively less and keyword overlap relatively more.

use std::collections::HashSet;

use crate::models::ChunkMetadata;

const SENDER_FILTERED_SEMANTIC_WEIGHT: f32 = 0.40;
const SENDER_FILTERED_KEYWORD_WEIGHT: f32 = 0.40;
const UNFILTERED_SEMANTIC_WEIGHT: f32 = 0.35;
const UNFILTERED_KEYWORD_WEIGHT: f32 = 0.45;
const URGENCY_BOOST: f32 = 0.10;
const DEADLINE_BOOST: f32 = 0.10;

/// A single scored retrieval candidate, still chunk-granular (callers
/// dedup to message granularity afterward).
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub document_text: String,
    pub metadata: ChunkMetadata,
    pub hybrid_score: f32,
}

fn keyword_score(document: &str, sender: &str, subject: &str, query_keywords: &HashSet<String>) -> f32 {
    if query_keywords.is_empty() {
        return 0.0;
    }
    let doc_lower = document.to_lowercase();
    let sender_lower = sender.to_lowercase();
    let subject_lower = subject.to_lowercase();

    let matches = query_keywords
        .iter()
        .filter(|kw| doc_lower.contains(kw.as_str()) || sender_lower.contains(kw.as_str()) || subject_lower.contains(kw.as_str()))
        .count();

    (matches as f32 / query_keywords.len() as f32).min(1.0)
}

/// Score one retrieved chunk against the query, given its vector
/// distance and whether a sender filter narrowed the candidate pool.
pub fn score_chunk(
    chunk_id: String,
    document_text: String,
    metadata: ChunkMetadata,
    distance: f32,
    query_keywords: &HashSet<String>,
    sender_filtered: bool,
) -> ScoredChunk {
    let semantic_score = (1.0 - distance).max(0.0);
    let kw_score = keyword_score(&document_text, &metadata.sender, &metadata.subject, query_keywords);

    let urgency_boost = if metadata.is_urgent { URGENCY_BOOST } else { 0.0 };
    let deadline_boost = if metadata.has_deadline { DEADLINE_BOOST } else { 0.0 };

    let hybrid_score = if sender_filtered {
        SENDER_FILTERED_SEMANTIC_WEIGHT * semantic_score + SENDER_FILTERED_KEYWORD_WEIGHT * kw_score
    } else {
        UNFILTERED_SEMANTIC_WEIGHT * semantic_score + UNFILTERED_KEYWORD_WEIGHT * kw_score
    } + urgency_boost
        + deadline_boost;

    ScoredChunk {
        chunk_id,
        document_text,
        metadata,
        hybrid_score,
    }
}

/// Keep only the highest-scoring chunk per message, then order
/// newest-first with score as a tiebreaker.
pub fn dedup_and_sort(chunks: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
    use std::collections::HashMap;

    let mut best: HashMap<i32, ScoredChunk> = HashMap::new();
    for chunk in chunks {
        let message_id = chunk.metadata.message_id;
        match best.get(&message_id) {
            Some(existing) if existing.hybrid_score >= chunk.hybrid_score => {}
            _ => {
                best.insert(message_id, chunk);
            }
        }
    }

    let mut unique: Vec<ScoredChunk> = best.into_values().collect();
    unique.sort_by(|a, b| {
        b.metadata
            .timestamp
            .cmp(&a.metadata.timestamp)
            .then(b.hybrid_score.partial_cmp(&a.hybrid_score).unwrap())
    });
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn meta(message_id: i32, timestamp: i64, urgent: bool, deadline: bool) -> ChunkMetadata {
        ChunkMetadata {
            message_id,
            sender: "alice@example.com".into(),
            subject: "Budget review".into(),
            date: Utc::now(),
            timestamp,
            is_read: true,
            is_urgent: urgent,
            has_deadline: deadline,
            deadline_date: None,
            chunk_index: 0,
        }
    }

    #[test]
    fn applies_unfiltered_weights_and_boosts() {
        let keywords: HashSet<String> = ["budget".to_string()].into_iter().collect();
        let scored = score_chunk(
            "1_0".into(),
            "the budget is due".into(),
            meta(1, 100, true, true),
            0.2,
            &keywords,
            false,
        );
        // semantic=0.8, keyword=1.0 -> 0.35*0.8 + 0.45*1.0 + 0.1 + 0.1 = 0.93
        assert!((scored.hybrid_score - 0.93).abs() < 1e-5);
    }

    #[test]
    fn applies_sender_filtered_weights() {
        let keywords: HashSet<String> = ["budget".to_string()].into_iter().collect();
        let scored = score_chunk(
            "1_0".into(),
            "the budget is due".into(),
            meta(1, 100, false, false),
            0.2,
            &keywords,
            true,
        );
        // semantic=0.8, keyword=1.0 -> 0.40*0.8 + 0.40*1.0 = 0.72
        assert!((scored.hybrid_score - 0.72).abs() < 1e-5);
    }

    #[test]
    fn dedup_keeps_best_chunk_per_message_newest_first() {
        let keywords: HashSet<String> = HashSet::new();
        let a = score_chunk("1_0".into(), "a".into(), meta(1, 100, false, false), 0.5, &keywords, false);
        let b = score_chunk("1_1".into(), "b".into(), meta(1, 100, false, false), 0.1, &keywords, false);
        let c = score_chunk("2_0".into(), "c".into(), meta(2, 200, false, false), 0.5, &keywords, false);

        let result = dedup_and_sort(vec![a, b, c]);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].metadata.message_id, 2);
        assert_eq!(result[1].chunk_id, "1_1");
    }
}
