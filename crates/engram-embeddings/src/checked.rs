//! Dimension guard around any embedder.

use std::sync::Arc;

use async_trait::async_trait;
use engram_core::error::{EngramError, EngramResult};
use engram_core::traits::{Embedder, EmbeddingAction};

/// Rejects empty vectors and vectors whose length differs from the
/// configured dimension. A dimension of 0 disables the length check.
pub struct CheckedEmbedder {
    inner: Arc<dyn Embedder>,
}

impl CheckedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>) -> Self {
        Self { inner }
    }

    fn check(&self, vector: Vec<f32>) -> EngramResult<Vec<f32>> {
        let expected = self.inner.dimension();
        if vector.is_empty() {
            return Err(EngramError::embedding(format!(
                "{} returned an empty embedding",
                self.inner.model_name()
            )));
        }
        if expected > 0 && vector.len() != expected {
            return Err(EngramError::embedding(format!(
                "{} returned {} dimensions, expected {}",
                self.inner.model_name(),
                vector.len(),
                expected
            )));
        }
        Ok(vector)
    }
}

#[async_trait]
impl Embedder for CheckedEmbedder {
    async fn embed(&self, text: &str, action: Option<EmbeddingAction>) -> EngramResult<Vec<f32>> {
        let vector = self.inner.embed(text, action).await?;
        self.check(vector)
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        action: Option<EmbeddingAction>,
    ) -> EngramResult<Vec<Vec<f32>>> {
        let vectors = self.inner.embed_batch(texts, action).await?;
        if vectors.len() != texts.len() {
            return Err(EngramError::embedding(format!(
                "batch returned {} embeddings for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        vectors.into_iter().map(|v| self.check(v)).collect()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<f32>);

    #[async_trait]
    impl Embedder for Fixed {
        async fn embed(&self, _: &str, _: Option<EmbeddingAction>) -> EngramResult<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_matching_dimension_passes() {
        let embedder = CheckedEmbedder::new(Arc::new(Fixed(vec![0.1, 0.2, 0.3])));
        assert_eq!(embedder.embed("x", None).await.unwrap().len(), 3);

        let batch = embedder
            .embed_batch(&["a".to_string(), "b".to_string()], None)
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[tokio::test]
    async fn test_wrong_dimension_rejected() {
        let embedder = CheckedEmbedder::new(Arc::new(Fixed(vec![0.1, 0.2])));
        let err = embedder.embed("x", None).await.unwrap_err();
        assert!(err.to_string().contains("expected 3"));

        let empty = CheckedEmbedder::new(Arc::new(Fixed(Vec::new())));
        assert!(empty.embed("x", None).await.is_err());
    }

    #[test]
    fn test_delegates_metadata() {
        let embedder = CheckedEmbedder::new(Arc::new(Fixed(vec![1.0, 0.0, 0.0])));
        assert_eq!(embedder.model_name(), "fixed");
        assert_eq!(embedder.dimension(), 3);

        let vector = tokio_test::block_on(embedder.embed("x", Some(EmbeddingAction::Query)));
        assert_eq!(vector.unwrap(), vec![1.0, 0.0, 0.0]);
    }
}
