//! Vector store contract.
//!
//! The vector store primitive itself (Chroma, pgvector, etc.) is an
//! external collaborator; this module defines only the operational
//! contract the core consumes, per user-namespaced collection.

use serde::Deserialize;
use thiserror::Error;

use crate::models::ChunkMetadata;

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("vector store request failed: {0}")]
    Backend(String),
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
}

/// Parallel-array result of a nearest-neighbor query, matching the shape
/// most vector store clients return.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VectorQueryResult {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
    pub distances: Vec<f32>,
}

/// Sanitize a user's email address into a collection name:
/// `emails_inbox_{sanitized}` with `@` and `.` replaced by `_`.
pub fn collection_name(email_address: &str) -> String {
    let sanitized = email_address.replace(['@', '.'], "_");
    format!("emails_inbox_{sanitized}")
}

#[rocket::async_trait]
pub trait VectorStore: Send + Sync {
    async fn create_collection(&self, name: &str) -> Result<(), VectorStoreError>;

    async fn collection_exists(&self, name: &str) -> Result<bool, VectorStoreError>;

    async fn count(&self, name: &str) -> Result<u64, VectorStoreError>;

    async fn add(
        &self,
        name: &str,
        ids: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        documents: Vec<String>,
        metadatas: Vec<ChunkMetadata>,
    ) -> Result<(), VectorStoreError>;

    /// All ids currently stored, used to compute the already-indexed set.
    async fn get_all_ids(&self, name: &str) -> Result<Vec<String>, VectorStoreError>;

    async fn query(
        &self,
        name: &str,
        embedding: Vec<f32>,
        n_results: usize,
    ) -> Result<VectorQueryResult, VectorStoreError>;
}

/// Default [`VectorStore`] adapter: a small JSON/HTTP contract any
/// vector database can sit behind (a thin shim over Chroma's REST API
/// or a pgvector sidecar alike), in the shape of the embeddings client's
/// `reqwest`-backed adapter.
pub mod http {
    use reqwest::{Client, StatusCode};
    use serde::{Deserialize, Serialize};

    use super::{ChunkMetadata, VectorQueryResult, VectorStore, VectorStoreError};

    pub struct HttpVectorStore {
        base_url: String,
        http: Client,
    }

    impl HttpVectorStore {
        pub fn new(base_url: impl Into<String>, http: Client) -> Self {
            Self {
                base_url: base_url.into().trim_end_matches('/').to_string(),
                http,
            }
        }

        fn collection_url(&self, name: &str) -> String {
            format!("{}/collections/{name}", self.base_url)
        }

        async fn error_for(response: reqwest::Response, name: &str) -> VectorStoreError {
            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return VectorStoreError::CollectionNotFound(name.to_string());
            }
            let body = response.text().await.unwrap_or_default();
            VectorStoreError::Backend(format!("{status}: {body}"))
        }
    }

    #[derive(Serialize)]
    struct AddRequest {
        ids: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        documents: Vec<String>,
        metadatas: Vec<ChunkMetadata>,
    }

    #[derive(Serialize)]
    struct QueryRequest {
        embedding: Vec<f32>,
        n_results: usize,
    }

    #[derive(Deserialize)]
    struct CountResponse {
        count: u64,
    }

    #[derive(Deserialize)]
    struct GetAllIdsResponse {
        ids: Vec<String>,
    }

    #[rocket::async_trait]
    impl VectorStore for HttpVectorStore {
        async fn create_collection(&self, name: &str) -> Result<(), VectorStoreError> {
            let response = self
                .http
                .put(self.collection_url(name))
                .send()
                .await
                .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::error_for(response, name).await)
            }
        }

        async fn collection_exists(&self, name: &str) -> Result<bool, VectorStoreError> {
            let response = self
                .http
                .get(self.collection_url(name))
                .send()
                .await
                .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
            Ok(response.status().is_success())
        }

        async fn count(&self, name: &str) -> Result<u64, VectorStoreError> {
            let response = self
                .http
                .get(format!("{}/count", self.collection_url(name)))
                .send()
                .await
                .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
            if !response.status().is_success() {
                return Err(Self::error_for(response, name).await);
            }
            let parsed: CountResponse = response
                .json()
                .await
                .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
            Ok(parsed.count)
        }

        async fn add(
            &self,
            name: &str,
            ids: Vec<String>,
            embeddings: Vec<Vec<f32>>,
            documents: Vec<String>,
            metadatas: Vec<ChunkMetadata>,
        ) -> Result<(), VectorStoreError> {
            let payload = AddRequest {
                ids,
                embeddings,
                documents,
                metadatas,
            };
            let response = self
                .http
                .post(format!("{}/add", self.collection_url(name)))
                .json(&payload)
                .send()
                .await
                .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::error_for(response, name).await)
            }
        }

        async fn get_all_ids(&self, name: &str) -> Result<Vec<String>, VectorStoreError> {
            let response = self
                .http
                .get(format!("{}/ids", self.collection_url(name)))
                .send()
                .await
                .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
            if !response.status().is_success() {
                return Err(Self::error_for(response, name).await);
            }
            let parsed: GetAllIdsResponse = response
                .json()
                .await
                .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
            Ok(parsed.ids)
        }

        async fn query(
            &self,
            name: &str,
            embedding: Vec<f32>,
            n_results: usize,
        ) -> Result<VectorQueryResult, VectorStoreError> {
            let payload = QueryRequest { embedding, n_results };
            let response = self
                .http
                .post(format!("{}/query", self.collection_url(name)))
                .json(&payload)
                .send()
                .await
                .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
            if !response.status().is_success() {
                return Err(Self::error_for(response, name).await);
            }
            response
                .json()
                .await
                .map_err(|e| VectorStoreError::Backend(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_email_into_collection_name() {
        assert_eq!(
            collection_name("alice.wong@example.com"),
            "emails_inbox_alice_wong_example_com"
        );
    }
}
