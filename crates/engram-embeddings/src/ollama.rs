//! Ollama embedding provider.
//!
//! With the `ollama` feature the `ollama-rs` client is used; otherwise the
//! `/api/embed` endpoint is called directly over HTTP.

use async_trait::async_trait;
use engram_core::error::{EngramError, EngramResult};
use engram_core::traits::{Embedder, EmbedderConfig, EmbeddingAction};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

#[cfg(feature = "ollama")]
use ollama_rs::{
    generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest},
    Ollama,
};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama embedding provider.
pub struct OllamaEmbedder {
    #[cfg(feature = "ollama")]
    client: Ollama,
    http: reqwest::Client,
    endpoint: Url,
    config: EmbedderConfig,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder.
    pub fn new(config: EmbedderConfig) -> EngramResult<Self> {
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let base = Url::parse(base_url)
            .map_err(|e| EngramError::Configuration(format!("Invalid Ollama URL: {}", e)))?;
        let endpoint = base
            .join("api/embed")
            .map_err(|e| EngramError::Configuration(format!("Invalid Ollama URL: {}", e)))?;

        #[cfg(feature = "ollama")]
        let client = {
            let host = format!(
                "{}://{}",
                base.scheme(),
                base.host_str().unwrap_or("localhost")
            );
            Ollama::new(host, base.port_or_known_default().unwrap_or(11434))
        };

        Ok(Self {
            #[cfg(feature = "ollama")]
            client,
            http: reqwest::Client::new(),
            endpoint,
            config,
        })
    }

    /// Nomic models expect a task prefix that differs for queries and
    /// documents.
    fn prepare(&self, text: &str, action: Option<EmbeddingAction>) -> String {
        if !self.config.model.starts_with("nomic-embed") {
            return text.to_string();
        }
        match action.unwrap_or_default() {
            EmbeddingAction::Query => format!("search_query: {}", text),
            EmbeddingAction::Index => format!("search_document: {}", text),
        }
    }

    #[cfg(feature = "ollama")]
    async fn request(&self, input: Vec<String>) -> EngramResult<Vec<Vec<f32>>> {
        let request = GenerateEmbeddingsRequest::new(
            self.config.model.clone(),
            EmbeddingsInput::Multiple(input),
        );
        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| EngramError::embedding(format!("Ollama embedding error: {}", e)))?;
        Ok(response.embeddings)
    }

    #[cfg(not(feature = "ollama"))]
    async fn request(&self, input: Vec<String>) -> EngramResult<Vec<Vec<f32>>> {
        let body = EmbedRequest {
            model: &self.config.model,
            input,
        };
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| EngramError::embedding(format!("Ollama embedding error: {}", e)))?;
        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EngramError::embedding(format!("Ollama response error: {}", e)))?;
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str, action: Option<EmbeddingAction>) -> EngramResult<Vec<f32>> {
        self.request(vec![self.prepare(text, action)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EngramError::embedding("No embedding returned"))
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        action: Option<EmbeddingAction>,
    ) -> EngramResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let input = texts.iter().map(|t| self.prepare(t, action)).collect();
        let embeddings = self.request(input).await?;
        debug!(count = embeddings.len(), endpoint = %self.endpoint, "Ollama embeddings received");
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dims
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_core::traits::EmbedderProvider;

    fn embedder(model: &str, base_url: Option<&str>) -> OllamaEmbedder {
        OllamaEmbedder::new(EmbedderConfig {
            provider: EmbedderProvider::Ollama,
            model: model.to_string(),
            embedding_dims: 768,
            api_key: None,
            base_url: base_url.map(str::to_string),
        })
        .unwrap()
    }

    #[test]
    fn test_nomic_prefixes() {
        let nomic = embedder("nomic-embed-text", None);
        assert_eq!(
            nomic.prepare("cats", Some(EmbeddingAction::Query)),
            "search_query: cats"
        );
        assert_eq!(nomic.prepare("cats", None), "search_document: cats");

        let plain = embedder("all-minilm", None);
        assert_eq!(plain.prepare("cats", Some(EmbeddingAction::Query)), "cats");
    }

    #[test]
    fn test_endpoint() {
        let local = embedder("all-minilm", None);
        assert_eq!(local.endpoint.as_str(), "http://localhost:11434/api/embed");

        let remote = embedder("all-minilm", Some("https://ollama.internal:8443/"));
        assert_eq!(remote.endpoint.as_str(), "https://ollama.internal:8443/api/embed");
    }
}
