//! engram-embeddings - Embedding providers for engram.
//!
//! Adapts remote embedding APIs to [`engram_core::Embedder`]. The engine
//! never computes embeddings itself; it only talks to these adapters.
//!
//! # Supported Providers
//!
//! - **OpenAI** (feature: `openai`) - text-embedding-3-small, text-embedding-3-large, etc.
//! - **Ollama** - local models; uses `ollama-rs` with the `ollama` feature,
//!   plain HTTP otherwise
//!
//! # Example
//!
//! ```ignore
//! use engram_core::{EmbedderConfig, EmbedderProvider};
//! use engram_embeddings::EmbedderFactory;
//!
//! let config = EmbedderConfig {
//!     provider: EmbedderProvider::Ollama,
//!     model: "nomic-embed-text".to_string(),
//!     embedding_dims: 768,
//!     ..Default::default()
//! };
//! let embedder = EmbedderFactory::from_config(&config)?;
//! ```

mod checked;
mod factory;
mod ollama;
mod openai;

pub use checked::CheckedEmbedder;
pub use factory::EmbedderFactory;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAIEmbedder;

// Re-export core types for convenience
pub use engram_core::traits::{Embedder, EmbedderConfig, EmbedderProvider, EmbeddingAction};
