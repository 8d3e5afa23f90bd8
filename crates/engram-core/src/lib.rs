//! engram-core - Core library for engram.
//!
//! Hybrid retrieval over a knowledge corpus: BM25 over a term index,
//! embedding similarity, and spreading activation over a weighted graph,
//! fused with reciprocal rank fusion and reranked for diversity.
//!
//! # Example
//!
//! ```ignore
//! use engram_core::{Engine, EngineConfig, Item, SearchOptions};
//!
//! let engine = Engine::builder(EngineConfig::default()).build().await?;
//! engine.index_item(Item::new("a", "cats are great pets")).await?;
//!
//! let response = engine.search("pets", &SearchOptions::default()).await?;
//! for hit in response.results {
//!     println!("{} {:.4} {}", hit.rank_position, hit.combined_score, hit.retrieval_method.label());
//! }
//! ```

pub mod activation;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod lexical;
pub mod retrieval;
pub mod semantic;
pub mod storage;
pub mod text;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use activation::{
    ActivationConfig, ActivationEngine, AutoConnectOutcome, EdgeKind, NodeSnapshot, WorkerConfig,
};
pub use cluster::{Cluster, ClusterOptions, ClusterReport, DistanceKind};
pub use config::{EngineConfig, SearchDefaults, StorageBackend};
pub use engine::{Engine, EngineBuilder};
pub use error::{EngramError, EngramResult, ErrorCode};
pub use lexical::{Bm25Params, LexicalIndex, TermIndex};
pub use retrieval::RrfFusion;
pub use semantic::{InMemoryVectorIndex, SemanticScorer};
pub use storage::{InMemoryRepository, SqliteRepository};
pub use traits::{
    Embedder, EmbedderConfig, EmbedderProvider, EmbeddingAction, KnowledgeRepository,
    VectorIndex, VectorMatch,
};
pub use types::{
    Item, ItemKind, PassReport, PassStatus, RetrievalMethod, ScoredResult, SearchOptions,
    SearchResponse, Signal, SignalWeights,
};
