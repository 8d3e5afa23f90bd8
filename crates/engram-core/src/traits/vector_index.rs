//! Vector similarity backend trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngramResult;

/// One hit from a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    /// Item id.
    pub id: String,
    /// Cosine similarity.
    pub similarity: f32,
}

impl VectorMatch {
    pub fn new(id: impl Into<String>, similarity: f32) -> Self {
        Self {
            id: id.into(),
            similarity,
        }
    }
}

/// Storage and lookup of item embeddings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the vector for `id`.
    async fn upsert(&self, id: &str, vector: Vec<f32>) -> EngramResult<()>;

    /// Stored vector for `id`.
    async fn get(&self, id: &str) -> EngramResult<Option<Vec<f32>>>;

    /// Up to `top_k` matches with similarity `>= threshold`, most similar
    /// first.
    async fn similarity_search(
        &self,
        query: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> EngramResult<Vec<VectorMatch>>;

    /// Number of stored vectors.
    async fn len(&self) -> EngramResult<usize>;

    /// Whether no vectors are stored.
    async fn is_empty(&self) -> EngramResult<bool> {
        Ok(self.len().await? == 0)
    }
}
