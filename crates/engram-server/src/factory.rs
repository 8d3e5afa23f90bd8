//! Factory for creating an Engine from configuration.

use std::sync::Arc;

use engram_core::config::{EngineConfig, StorageBackend};
use engram_core::error::EngramResult;
use engram_core::traits::{KnowledgeRepository, VectorIndex};
use engram_core::{Engine, InMemoryRepository, InMemoryVectorIndex, SqliteRepository};
use engram_embeddings::EmbedderFactory;
use tracing::info;

/// Create an Engine from configuration.
pub async fn create_engine(config: EngineConfig) -> EngramResult<Engine> {
    let repository = create_repository(&config)?;
    let embedder = EmbedderFactory::from_config(&config.embedder)?;
    let vectors: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::new());

    Engine::open(config, repository, embedder, vectors).await
}

fn create_repository(config: &EngineConfig) -> EngramResult<Arc<dyn KnowledgeRepository>> {
    match config.storage {
        StorageBackend::Memory => {
            info!("Using in-memory repository");
            Ok(Arc::new(InMemoryRepository::new()))
        }
        StorageBackend::Sqlite => {
            std::fs::create_dir_all(&config.data_dir)?;
            let path = config.database_path();
            info!(path = %path.display(), "Using SQLite repository");
            Ok(Arc::new(SqliteRepository::new(path)?))
        }
    }
}
