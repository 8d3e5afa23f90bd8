//! Brute-force in-memory vector index.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use ordered_float::OrderedFloat;

use crate::error::{EngramError, EngramResult};
use crate::text::cosine_similarity;
use crate::traits::{VectorIndex, VectorMatch};

/// Cosine-similarity index over a `HashMap`. Suitable for small partitions
/// and tests.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    vectors: RwLock<HashMap<String, Vec<f32>>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned<E: std::fmt::Display>(e: E) -> EngramError {
        EngramError::internal(format!("vector index lock poisoned: {}", e))
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, id: &str, vector: Vec<f32>) -> EngramResult<()> {
        if vector.is_empty() {
            return Err(EngramError::validation("embedding vector is empty"));
        }
        self.vectors
            .write()
            .map_err(Self::poisoned)?
            .insert(id.to_string(), vector);
        Ok(())
    }

    async fn get(&self, id: &str) -> EngramResult<Option<Vec<f32>>> {
        Ok(self.vectors.read().map_err(Self::poisoned)?.get(id).cloned())
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> EngramResult<Vec<VectorMatch>> {
        let vectors = self.vectors.read().map_err(Self::poisoned)?;
        let mut matches: Vec<VectorMatch> = vectors
            .iter()
            .map(|(id, v)| VectorMatch::new(id.clone(), cosine_similarity(query, v)))
            .filter(|m| m.similarity >= threshold)
            .collect();
        matches.sort_by(|a, b| {
            OrderedFloat(b.similarity)
                .cmp(&OrderedFloat(a.similarity))
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn len(&self) -> EngramResult<usize> {
        Ok(self.vectors.read().map_err(Self::poisoned)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_similarity_search_threshold_and_order() {
        let index = InMemoryVectorIndex::new();
        index.upsert("x", vec![1.0, 0.0]).await.unwrap();
        index.upsert("y", vec![0.7, 0.7]).await.unwrap();
        index.upsert("z", vec![0.0, 1.0]).await.unwrap();

        let hits = index.similarity_search(&[1.0, 0.0], 10, 0.5).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);

        let top1 = index.similarity_search(&[1.0, 0.0], 1, 0.0).await.unwrap();
        assert_eq!(top1.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let index = InMemoryVectorIndex::new();
        index.upsert("x", vec![1.0, 0.0]).await.unwrap();
        index.upsert("x", vec![0.0, 1.0]).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 1);
        assert_eq!(index.get("x").await.unwrap(), Some(vec![0.0, 1.0]));
        assert!(index.upsert("e", Vec::new()).await.is_err());
    }
}
