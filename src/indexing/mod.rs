//! Turns a user's stored INBOX messages into vector-store chunks.
//!
//! Bridges the relational store, the chunker, the embedding client, and
//! the vector store behind the [`IndexExecutor`] contract the lifecycle
//! manager drives. New messages are chunked and embedded in bounded
//! batches (50 messages per producer task, up to 4 producers running at
//! once; embedding concurrency capped at 64 in flight) rather than one
//! giant pass, so a single slow embedding call can't stall the whole run.

pub mod chunking;
pub mod deadline;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::embeddings::{EmbeddingClient, EmbeddingError};
use crate::lifecycle::{IndexExecutor, IndexRunOutcome, IndexingError};
use crate::persistence::vector::{collection_name, VectorStore, VectorStoreError};
use crate::persistence::RelationalStore;
use crate::retrieval::cache::QueryCache;
use chunking::chunk_message;

const MESSAGES_PER_PRODUCER_BATCH: usize = 50;
const MAX_CONCURRENT_PRODUCERS: usize = 4;
const MAX_CONCURRENT_EMBEDDINGS: usize = 64;

pub struct Indexer {
    store: Arc<dyn RelationalStore>,
    embeddings: Arc<dyn EmbeddingClient>,
    vectors: Arc<dyn VectorStore>,
    query_cache: Arc<QueryCache>,
    chunk_size: usize,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn RelationalStore>,
        embeddings: Arc<dyn EmbeddingClient>,
        vectors: Arc<dyn VectorStore>,
        query_cache: Arc<QueryCache>,
        chunk_size: usize,
    ) -> Self {
        Self {
            store,
            embeddings,
            vectors,
            query_cache,
            chunk_size,
        }
    }
}

/// A 429 from the embeddings provider during an index run surfaces as
/// [`IndexingError::RateLimited`] so the lifecycle manager cools the user
/// down instead of burning through retries against a backend that's
/// already asking us to back off.
fn embedding_to_indexing_error(err: EmbeddingError) -> IndexingError {
    if let EmbeddingError::Status { status, .. } = &err {
        if *status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return IndexingError::RateLimited;
        }
    }
    IndexingError::Transient(err.to_string())
}

fn vector_store_to_indexing_error(err: VectorStoreError) -> IndexingError {
    IndexingError::Transient(err.to_string())
}

fn already_indexed_message_ids(existing_chunk_ids: &[String]) -> HashSet<i32> {
    existing_chunk_ids
        .iter()
        .filter_map(|id| id.split('_').next())
        .filter_map(|id| id.parse::<i32>().ok())
        .collect()
}

#[rocket::async_trait]
impl IndexExecutor for Indexer {
    async fn index_user(&self, user_id: i32) -> Result<IndexRunOutcome, IndexingError> {
        let user = self
            .store
            .get_user(user_id)
            .await
            .map_err(|e| IndexingError::Transient(e.to_string()))?
            .ok_or_else(|| IndexingError::Transient(format!("unknown user {user_id}")))?;

        let collection = collection_name(&user.email_address);
        if !self
            .vectors
            .collection_exists(&collection)
            .await
            .map_err(|e| IndexingError::Transient(e.to_string()))?
        {
            self.vectors
                .create_collection(&collection)
                .await
                .map_err(|e| IndexingError::Transient(e.to_string()))?;
        }

        let all_messages = self
            .store
            .list_all_inbox_messages(user_id)
            .await
            .map_err(|e| IndexingError::Transient(e.to_string()))?;

        let existing_ids = self
            .vectors
            .get_all_ids(&collection)
            .await
            .map_err(|e| IndexingError::Transient(e.to_string()))?;
        let already_indexed = already_indexed_message_ids(&existing_ids);

        let new_messages: Vec<_> = all_messages
            .iter()
            .filter(|m| !already_indexed.contains(&m.message_id))
            .cloned()
            .collect();

        if new_messages.is_empty() {
            return Ok(IndexRunOutcome {
                email_count: all_messages.len() as u64,
                new_emails: 0,
            });
        }

        let now = Utc::now();
        let embed_permits = Arc::new(Semaphore::new(MAX_CONCURRENT_EMBEDDINGS));
        let producer_permits = Arc::new(Semaphore::new(MAX_CONCURRENT_PRODUCERS));

        let mut producers = JoinSet::new();

        for batch in new_messages.chunks(MESSAGES_PER_PRODUCER_BATCH) {
            let batch = batch.to_vec();
            let embeddings = Arc::clone(&self.embeddings);
            let vectors = Arc::clone(&self.vectors);
            let embed_permits = Arc::clone(&embed_permits);
            let producer_permits = Arc::clone(&producer_permits);
            let collection = collection.clone();
            let chunk_size = self.chunk_size;

            producers.spawn(async move {
                let _producer_permit = producer_permits
                    .acquire()
                    .await
                    .expect("producer semaphore never closes");

                let mut chunks = Vec::new();
                for message in &batch {
                    chunks.extend(chunk_message(message, chunk_size, now));
                }

                let mut embedded_ids = Vec::with_capacity(chunks.len());
                let mut embedded_vectors = Vec::with_capacity(chunks.len());
                let mut embedded_docs = Vec::with_capacity(chunks.len());
                let mut embedded_meta = Vec::with_capacity(chunks.len());

                for chunk in chunks {
                    let _embed_permit = embed_permits
                        .acquire()
                        .await
                        .expect("embedding semaphore never closes");
                    let vector = embeddings
                        .embed(&chunk.document_text)
                        .await
                        .map_err(embedding_to_indexing_error)?;
                    embedded_ids.push(chunk.chunk_id);
                    embedded_vectors.push(vector);
                    embedded_docs.push(chunk.document_text);
                    embedded_meta.push(chunk.metadata);
                }

                if !embedded_ids.is_empty() {
                    vectors
                        .add(&collection, embedded_ids, embedded_vectors, embedded_docs, embedded_meta)
                        .await
                        .map_err(vector_store_to_indexing_error)?;
                }

                Ok::<(), IndexingError>(())
            });
        }

        while let Some(result) = producers.join_next().await {
            result.map_err(|e| IndexingError::Transient(format!("producer task panicked: {e}")))??;
        }

        self.query_cache.clear();

        Ok(IndexRunOutcome {
            email_count: all_messages.len() as u64,
            new_emails: new_messages.len() as u64,
        })
    }
}
