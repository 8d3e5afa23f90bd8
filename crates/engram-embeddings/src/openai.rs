//! OpenAI embedding provider.

use async_trait::async_trait;
use engram_core::error::{EngramError, EngramResult};
use engram_core::traits::{Embedder, EmbedderConfig, EmbeddingAction};
use tracing::debug;

#[cfg(feature = "openai")]
use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequest, EmbeddingInput},
    Client,
};

/// OpenAI embedding provider.
pub struct OpenAIEmbedder {
    #[cfg(feature = "openai")]
    client: Client<OpenAIConfig>,
    config: EmbedderConfig,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder. The key comes from the config or
    /// `OPENAI_API_KEY`.
    pub fn new(config: EmbedderConfig) -> EngramResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                EngramError::Configuration(
                    "OpenAI API key not found. Set OPENAI_API_KEY or embedder.api_key.".to_string(),
                )
            })?;

        #[cfg(feature = "openai")]
        let client = {
            let mut openai = OpenAIConfig::new().with_api_key(api_key);
            if let Some(ref base_url) = config.base_url {
                openai = openai.with_api_base(base_url);
            }
            Client::with_config(openai)
        };
        #[cfg(not(feature = "openai"))]
        let _ = api_key;

        Ok(Self {
            #[cfg(feature = "openai")]
            client,
            config,
        })
    }

    /// `text-embedding-3-*` models accept a reduced output dimension.
    fn requested_dimensions(&self) -> Option<u32> {
        if self.config.model.starts_with("text-embedding-3") && self.config.embedding_dims > 0 {
            u32::try_from(self.config.embedding_dims).ok()
        } else {
            None
        }
    }

    #[cfg(feature = "openai")]
    async fn request(&self, input: EmbeddingInput) -> EngramResult<Vec<Vec<f32>>> {
        let request = CreateEmbeddingRequest {
            model: self.config.model.clone(),
            input,
            dimensions: self.requested_dimensions(),
            ..Default::default()
        };

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| EngramError::embedding(format!("OpenAI embedding error: {}", e)))?;

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        debug!(count = data.len(), model = %self.config.model, "OpenAI embeddings received");
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[cfg(feature = "openai")]
    async fn embed(&self, text: &str, _action: Option<EmbeddingAction>) -> EngramResult<Vec<f32>> {
        self.request(EmbeddingInput::String(text.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EngramError::embedding("No embedding returned"))
    }

    #[cfg(not(feature = "openai"))]
    async fn embed(&self, _text: &str, _action: Option<EmbeddingAction>) -> EngramResult<Vec<f32>> {
        debug!(dims = ?self.requested_dimensions(), "OpenAI feature disabled");
        Err(EngramError::Configuration(
            "OpenAI feature not enabled. Enable the 'openai' feature.".to_string(),
        ))
    }

    #[cfg(feature = "openai")]
    async fn embed_batch(
        &self,
        texts: &[String],
        _action: Option<EmbeddingAction>,
    ) -> EngramResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(EmbeddingInput::StringArray(texts.to_vec())).await
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dims
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
