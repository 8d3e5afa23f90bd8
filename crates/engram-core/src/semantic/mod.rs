//! Semantic scorer.
//!
//! Adapts an external [`Embedder`] and a [`VectorIndex`] into a scoring
//! pass. Every provider failure, including an elapsed timeout, surfaces as
//! `ProviderUnavailable` so fusion can degrade around it.

mod memory_index;

pub use memory_index::InMemoryVectorIndex;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{EngramError, EngramResult, ErrorCode};
use crate::traits::{Embedder, EmbeddingAction, VectorIndex};

/// Embedding provider plus vector backend, bounded by a timeout.
#[derive(Clone)]
pub struct SemanticScorer {
    embedder: Option<Arc<dyn Embedder>>,
    vectors: Arc<dyn VectorIndex>,
    timeout: Duration,
}

impl SemanticScorer {
    pub fn new(
        embedder: Option<Arc<dyn Embedder>>,
        vectors: Arc<dyn VectorIndex>,
        timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            vectors,
            timeout,
        }
    }

    /// Whether an embedding provider is configured.
    pub fn is_enabled(&self) -> bool {
        self.embedder.is_some()
    }

    /// The vector backend.
    pub fn vectors(&self) -> &Arc<dyn VectorIndex> {
        &self.vectors
    }

    fn embedder(&self) -> EngramResult<&Arc<dyn Embedder>> {
        self.embedder
            .as_ref()
            .ok_or_else(|| EngramError::provider_unavailable("no embedding provider configured"))
    }

    async fn bounded<T>(&self, fut: impl Future<Output = EngramResult<T>>) -> EngramResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(unavailable),
            Err(_) => Err(EngramError::provider_timeout(self.timeout.as_millis() as u64)),
        }
    }

    /// Embed `text` under the timeout.
    pub async fn embed(&self, text: &str, action: EmbeddingAction) -> EngramResult<Vec<f32>> {
        let embedder = self.embedder()?;
        self.bounded(embedder.embed(text, Some(action))).await
    }

    /// Nearest stored vectors as `(id, similarity)`.
    pub async fn similarity_search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> EngramResult<Vec<(String, f32)>> {
        let matches = self
            .bounded(self.vectors.similarity_search(query_vector, top_k, threshold))
            .await?;
        Ok(matches.into_iter().map(|m| (m.id, m.similarity)).collect())
    }

    /// Full semantic pass: embed the query, then look up neighbors. The
    /// timeout bounds both steps together.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> EngramResult<Vec<(String, f32)>> {
        let embedder = self.embedder()?;
        let vectors = Arc::clone(&self.vectors);
        let hits = self
            .bounded(async move {
                let query_vector = embedder.embed(query, Some(EmbeddingAction::Query)).await?;
                vectors
                    .similarity_search(&query_vector, top_k, threshold)
                    .await
            })
            .await?;
        debug!(hits = hits.len(), "Semantic pass complete");
        Ok(hits.into_iter().map(|m| (m.id, m.similarity)).collect())
    }

    /// Embed an item's text and store the vector.
    pub async fn index(&self, id: &str, text: &str) -> EngramResult<()> {
        let vector = self.embed(text, EmbeddingAction::Index).await?;
        self.vectors.upsert(id, vector).await
    }
}

/// Wrap any provider-side error as `ProviderUnavailable`.
fn unavailable(err: EngramError) -> EngramError {
    match err {
        e @ EngramError::ProviderUnavailable { .. } => e,
        other => EngramError::ProviderUnavailable {
            message: other.to_string(),
            code: ErrorCode::SemUnavailable,
            source: Some(Box::new(other)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockEmbedder;

    fn scorer(embedder: MockEmbedder, timeout_ms: u64) -> SemanticScorer {
        SemanticScorer::new(
            Some(Arc::new(embedder)),
            Arc::new(InMemoryVectorIndex::new()),
            Duration::from_millis(timeout_ms),
        )
    }

    #[tokio::test]
    async fn test_search_returns_neighbors() {
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|text, _| {
            if text.contains("cat") {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        });
        let scorer = scorer(embedder, 1000);

        scorer.index("a", "a cat").await.unwrap();
        scorer.index("b", "a stock").await.unwrap();

        let hits = scorer.search("cat food", 10, 0.5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "a");
    }

    #[tokio::test]
    async fn test_provider_error_becomes_unavailable() {
        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed()
            .returning(|_, _| Err(EngramError::embedding("connection refused")));
        let scorer = scorer(embedder, 1000);

        let err = scorer.search("anything", 10, 0.5).await.unwrap_err();
        assert!(matches!(err, EngramError::ProviderUnavailable { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_missing_provider_is_unavailable() {
        let scorer = SemanticScorer::new(
            None,
            Arc::new(InMemoryVectorIndex::new()),
            Duration::from_millis(100),
        );
        assert!(!scorer.is_enabled());
        let err = scorer.search("anything", 10, 0.5).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::SemUnavailable);
    }

    struct SlowEmbedder;

    #[async_trait::async_trait]
    impl Embedder for SlowEmbedder {
        async fn embed(&self, _: &str, _: Option<EmbeddingAction>) -> EngramResult<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![1.0])
        }

        fn dimension(&self) -> usize {
            1
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_timeout_becomes_unavailable() {
        let scorer = SemanticScorer::new(
            Some(Arc::new(SlowEmbedder)),
            Arc::new(InMemoryVectorIndex::new()),
            Duration::from_millis(20),
        );
        let err = scorer.search("anything", 10, 0.5).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::SemTimeout);
        assert!(err.is_recoverable());
    }
}
