//! Factory for creating embedding providers.

use std::sync::Arc;

use engram_core::error::{EngramError, EngramResult};
use engram_core::traits::{Embedder, EmbedderConfig, EmbedderProvider};
use tracing::info;

use crate::checked::CheckedEmbedder;
use crate::ollama::OllamaEmbedder;
use crate::openai::OpenAIEmbedder;

/// Factory for creating embedding providers.
pub struct EmbedderFactory;

impl EmbedderFactory {
    /// Build the provider named in `config`, wrapped in a dimension check.
    ///
    /// `EmbedderProvider::None` yields `Ok(None)`: the engine then runs
    /// without a semantic pass.
    pub fn from_config(config: &EmbedderConfig) -> EngramResult<Option<Arc<dyn Embedder>>> {
        let embedder: Arc<dyn Embedder> = match config.provider {
            EmbedderProvider::None => return Ok(None),
            EmbedderProvider::OpenAI => Arc::new(OpenAIEmbedder::new(config.clone())?),
            EmbedderProvider::Ollama => Arc::new(OllamaEmbedder::new(config.clone())?),
        };
        info!(
            provider = %config.provider,
            model = embedder.model_name(),
            dims = embedder.dimension(),
            "Embedding provider ready"
        );
        Ok(Some(Arc::new(CheckedEmbedder::new(embedder))))
    }

    /// Like [`from_config`](Self::from_config), but a missing provider is a
    /// configuration error.
    pub fn create(config: &EmbedderConfig) -> EngramResult<Arc<dyn Embedder>> {
        Self::from_config(config)?.ok_or_else(|| EngramError::UnsupportedProvider {
            provider: config.provider.to_string(),
        })
    }

    /// OpenAI embedder with a specific model.
    pub fn openai_with_model(model: impl Into<String>, dims: usize) -> EngramResult<Arc<dyn Embedder>> {
        Self::create(&EmbedderConfig {
            provider: EmbedderProvider::OpenAI,
            model: model.into(),
            embedding_dims: dims,
            ..Default::default()
        })
    }

    /// Ollama embedder with `nomic-embed-text` on localhost.
    pub fn ollama() -> EngramResult<Arc<dyn Embedder>> {
        Self::ollama_with_model("nomic-embed-text", 768)
    }

    /// Ollama embedder with a specific model.
    pub fn ollama_with_model(model: impl Into<String>, dims: usize) -> EngramResult<Arc<dyn Embedder>> {
        Self::create(&EmbedderConfig {
            provider: EmbedderProvider::Ollama,
            model: model.into(),
            embedding_dims: dims,
            ..Default::default()
        })
    }
}
