//! Configuration system for engram.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use strum::{Display, EnumString};
use tracing::warn;

use crate::activation::{ActivationConfig, WorkerConfig};
use crate::error::{EngramError, EngramResult};
use crate::lexical::Bm25Params;
use crate::retrieval::RrfFusion;
use crate::traits::{EmbedderConfig, EmbedderProvider};

/// Where items and nodes are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StorageBackend {
    /// Nothing survives a restart.
    Memory,
    /// `engram.db` under the data directory.
    #[default]
    Sqlite,
}

/// Search-wide settings that are not per-request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchDefaults {
    /// Upper bound on the semantic pass. Default: 2000
    pub semantic_timeout_ms: u64,
    /// Candidates each pass contributes before fusion. Default: 50
    pub candidate_pool: usize,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            semantic_timeout_ms: 2000,
            candidate_pool: 50,
        }
    }
}

impl SearchDefaults {
    pub fn semantic_timeout(&self) -> Duration {
        Duration::from_millis(self.semantic_timeout_ms)
    }
}

/// Main engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub bm25: Bm25Params,
    pub fusion: RrfFusion,
    pub activation: ActivationConfig,
    pub worker: WorkerConfig,
    pub search: SearchDefaults,
    pub embedder: EmbedderConfig,
    pub storage: StorageBackend,
    /// Directory holding the SQLite database.
    pub data_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|d| d.join("engram"))
            .unwrap_or_else(|| PathBuf::from(".engram"));

        Self {
            bm25: Bm25Params::default(),
            fusion: RrfFusion::default(),
            activation: ActivationConfig::default(),
            worker: WorkerConfig::default(),
            search: SearchDefaults::default(),
            embedder: EmbedderConfig::default(),
            storage: StorageBackend::default(),
            data_dir,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> EngramResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| EngramError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| EngramError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| EngramError::Configuration(e.to_string()))?,
            _ => {
                return Err(EngramError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `ENGRAM_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from `lookup`. Unparsable values are logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: FromStr>(key: &str, value: Option<String>) -> Option<T> {
            let raw = value?;
            match raw.trim().parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(key, value = %raw, "Ignoring unparsable environment override");
                    None
                }
            }
        }

        if let Some(dir) = lookup("ENGRAM_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(backend) = parsed::<StorageBackend>("ENGRAM_STORAGE", lookup("ENGRAM_STORAGE")) {
            self.storage = backend;
        }

        // Embedder
        if let Some(provider) =
            parsed::<EmbedderProvider>("ENGRAM_EMBEDDER", lookup("ENGRAM_EMBEDDER"))
        {
            self.embedder.provider = provider;
        }
        if let Some(model) = lookup("ENGRAM_EMBEDDER_MODEL") {
            self.embedder.model = model;
        }
        if let Some(dims) = parsed("ENGRAM_EMBEDDING_DIMS", lookup("ENGRAM_EMBEDDING_DIMS")) {
            self.embedder.embedding_dims = dims;
        }
        if let Some(url) = lookup("ENGRAM_EMBEDDER_BASE_URL") {
            self.embedder.base_url = Some(url);
        }
        if let Some(key) = lookup("ENGRAM_EMBEDDER_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.embedder.api_key = Some(key);
        }

        // Search and worker
        if let Some(ms) = parsed(
            "ENGRAM_SEMANTIC_TIMEOUT_MS",
            lookup("ENGRAM_SEMANTIC_TIMEOUT_MS"),
        ) {
            self.search.semantic_timeout_ms = ms;
        }
        if let Some(ms) = parsed("ENGRAM_WORKER_TICK_MS", lookup("ENGRAM_WORKER_TICK_MS")) {
            self.worker.tick_interval_ms = ms;
        }
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Path of the SQLite database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("engram.db")
    }

    /// Check every section.
    pub fn validate(&self) -> EngramResult<()> {
        let section = |name: &str, result: Result<(), &'static str>| {
            result.map_err(|e| EngramError::Configuration(format!("{}: {}", name, e)))
        };
        section("bm25", self.bm25.validate())?;
        section("fusion", self.fusion.validate())?;
        section("activation", self.activation.validate())?;
        section("worker", self.worker.validate())?;
        if self.search.semantic_timeout_ms == 0 {
            return Err(EngramError::Configuration(
                "search: semantic_timeout_ms must be positive".to_string(),
            ));
        }
        if self.search.candidate_pool == 0 {
            return Err(EngramError::Configuration(
                "search: candidate_pool must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for EngineConfig.
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn bm25(mut self, params: Bm25Params) -> Self {
        self.config.bm25 = params;
        self
    }

    pub fn fusion(mut self, fusion: RrfFusion) -> Self {
        self.config.fusion = fusion;
        self
    }

    pub fn activation(mut self, config: ActivationConfig) -> Self {
        self.config.activation = config;
        self
    }

    pub fn worker(mut self, config: WorkerConfig) -> Self {
        self.config.worker = config;
        self
    }

    pub fn search(mut self, defaults: SearchDefaults) -> Self {
        self.config.search = defaults;
        self
    }

    /// Set the semantic pass timeout.
    pub fn semantic_timeout(mut self, timeout: Duration) -> Self {
        self.config.search.semantic_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn embedder(mut self, config: EmbedderConfig) -> Self {
        self.config.embedder = config;
        self
    }

    pub fn storage(mut self, backend: StorageBackend) -> Self {
        self.config.storage = backend;
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> EngramResult<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
