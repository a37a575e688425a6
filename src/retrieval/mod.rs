//! Hybrid retrieval: query expansion, dense recall, sender filtering,
//! hybrid scoring, dedup, and a TTL cache in front of all of it.

pub mod cache;
pub mod scoring;
pub mod sender;

use std::collections::HashSet;

use thiserror::Error;

use crate::embeddings::{EmbeddingClient, EmbeddingError};
use crate::persistence::vector::{VectorStore, VectorStoreError};

use cache::QueryCache;
use scoring::{dedup_and_sort, score_chunk, ScoredChunk};

const SENDER_FILTER_POOL_CAP: usize = 300;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),
}

/// Widen a query with a few fixed related terms when it names a category
/// the embedding model tends to under-match on its own.
pub fn expand_query(query: &str) -> String {
    let lower = query.to_lowercase();
    if lower.contains("urgent") {
        format!("{query} asap immediate critical")
    } else if lower.contains("deadline") {
        format!("{query} due date")
    } else if lower.contains("meeting") {
        format!("{query} schedule appointment call")
    } else {
        query.to_string()
    }
}

pub struct HybridRetriever<'a> {
    embeddings: &'a dyn EmbeddingClient,
    vectors: &'a dyn VectorStore,
    cache: &'a QueryCache,
}

impl<'a> HybridRetriever<'a> {
    pub fn new(embeddings: &'a dyn EmbeddingClient, vectors: &'a dyn VectorStore, cache: &'a QueryCache) -> Self {
        Self {
            embeddings,
            vectors,
            cache,
        }
    }

    /// Search a user's INBOX collection, returning message-deduplicated,
    /// newest-first scored chunks. Cached by `(user_id, query,
    /// sender_filter)` for the configured TTL.
    pub async fn search(
        &self,
        user_id: i32,
        collection_name: &str,
        query: &str,
        top_k: usize,
        sender_filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        if let Some(cached) = self.cache.get(user_id, query, sender_filter) {
            log::debug!("retrieval cache hit for user {user_id}");
            return Ok(cached);
        }

        let total = self.vectors.count(collection_name).await?;
        if total == 0 {
            return Ok(Vec::new());
        }

        let expanded = expand_query(query);
        let embedding = self.embeddings.embed(&expanded).await?;

        let n_results = if sender_filter.is_some() {
            (SENDER_FILTER_POOL_CAP as u64).min(total) as usize
        } else {
            ((top_k * 3) as u64).min(total) as usize
        };

        let result = self.vectors.query(collection_name, embedding, n_results).await?;

        let query_keywords: HashSet<String> = query.to_lowercase().split_whitespace().map(String::from).collect();

        let mut matched = 0usize;
        let mut scored = Vec::with_capacity(result.ids.len());

        for i in 0..result.ids.len() {
            let metadata = result.metadatas[i].clone();

            if let Some(filter) = sender_filter {
                if !sender::sender_matches(&metadata.sender, filter) {
                    continue;
                }
                matched += 1;
            }

            scored.push(score_chunk(
                result.ids[i].clone(),
                result.documents[i].clone(),
                metadata,
                result.distances[i],
                &query_keywords,
                sender_filter.is_some(),
            ));
        }

        if let Some(filter) = sender_filter {
            if matched == 0 {
                log::warn!("no emails found from sender '{filter}'; check spelling or try a partial address");
            }
        }

        let unique = dedup_and_sort(scored);

        let take = if sender_filter.is_some() { 50 } else { top_k };
        let final_results: Vec<ScoredChunk> = unique.into_iter().take(take).collect();

        self.cache.set(user_id, query, sender_filter, final_results.clone());
        Ok(final_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_urgent_queries() {
        assert_eq!(expand_query("urgent tasks"), "urgent tasks asap immediate critical");
    }

    #[test]
    fn expands_deadline_queries() {
        assert_eq!(expand_query("deadline for report"), "deadline for report due date");
    }

    #[test]
    fn leaves_plain_queries_unchanged() {
        assert_eq!(expand_query("budget review"), "budget review");
    }
}
