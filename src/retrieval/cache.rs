//! TTL-expiring query cache.
//!
//! A plain dict cache never clears, so previously-served results survive
//! a reindex; entries here age out on their own, and indexing success
//! also invalidates the whole cache, giving overlapping correctness
//! guarantees instead of one.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

use super::scoring::ScoredChunk;

fn cache_key(user_id: i32, query: &str, sender_filter: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.to_le_bytes());
    hasher.update(b":");
    hasher.update(query.as_bytes());
    hasher.update(b":");
    hasher.update(sender_filter.unwrap_or("").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Thread-safe in-memory cache of retrieval results, keyed by a hash of
/// `(user, query, sender_filter)`, with a per-entry time-to-live.
pub struct QueryCache {
    store: DashMap<String, (Vec<ScoredChunk>, Instant)>,
    ttl: Duration,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, user_id: i32, query: &str, sender_filter: Option<&str>) -> Option<Vec<ScoredChunk>> {
        let key = cache_key(user_id, query, sender_filter);
        let hit = self.store.get(&key)?;
        let (value, inserted_at) = hit.value();
        if inserted_at.elapsed() > self.ttl {
            drop(hit);
            self.store.remove(&key);
            return None;
        }
        Some(value.clone())
    }

    pub fn set(&self, user_id: i32, query: &str, sender_filter: Option<&str>, value: Vec<ScoredChunk>) {
        let key = cache_key(user_id, query, sender_filter);
        self.store.insert(key, (value, Instant::now()));
    }

    /// Invalidate everything. Called after a successful index run so
    /// stale pre-index results are never served.
    pub fn clear(&self) {
        self.store.clear();
    }

    pub fn evict_expired(&self) {
        let ttl = self.ttl;
        self.store.retain(|_, (_, inserted_at)| inserted_at.elapsed() <= ttl);
    }

    pub fn len(&self) -> usize {
        self.evict_expired();
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl.as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use chrono::Utc;

    fn sample_chunk() -> ScoredChunk {
        ScoredChunk {
            chunk_id: "1_0".into(),
            document_text: "hello".into(),
            metadata: ChunkMetadata {
                message_id: 1,
                sender: "a@example.com".into(),
                subject: "s".into(),
                date: Utc::now(),
                timestamp: 0,
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
    fn stores_and_retrieves_by_key() {
        let cache = QueryCache::new(Duration::from_secs(300));
        assert!(cache.get(1, "q", None).is_none());
        cache.set(1, "q", None, vec![sample_chunk()]);
        assert_eq!(cache.get(1, "q", None).unwrap().len(), 1);
        assert!(cache.get(1, "q", Some("alice")).is_none());
    }

    #[test]
    fn expires_after_ttl() {
        let cache = QueryCache::new(Duration::from_millis(1));
        cache.set(1, "q", None, vec![sample_chunk()]);
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get(1, "q", None).is_none());
    }

    #[test]
    fn clear_invalidates_everything() {
        let cache = QueryCache::new(Duration::from_secs(300));
        cache.set(1, "q", None, vec![sample_chunk()]);
        cache.clear();
        assert!(cache.get(1, "q", None).is_none());
    }
}
