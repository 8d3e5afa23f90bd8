//! Engine facade.
//!
//! [`Engine`] owns the term index, the semantic scorer, the activation graph
//! and its worker, and the repository handle. Searches run the lexical,
//! semantic and graph passes concurrently, fuse them with weighted RRF, then
//! apply temporal decay and MMR.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::activation::{ActivationEngine, NodeSnapshot};
use crate::cluster::{self, ClusterOptions, ClusterPoint, ClusterReport, DistanceKind};
use crate::config::EngineConfig;
use crate::error::{EngramError, EngramResult};
use crate::lexical::{rank, score, LexicalIndex, TermIndex};
use crate::retrieval::{apply_temporal_decay, mmr_select, FusedCandidate, MmrCandidate, RankedList};
use crate::semantic::{InMemoryVectorIndex, SemanticScorer};
use crate::storage::InMemoryRepository;
use crate::text::{token_set, tokenize};
use crate::traits::{Embedder, KnowledgeRepository, VectorIndex};
use crate::types::{
    Item, ItemKind, PassReport, PassStatus, ScoredResult, SearchOptions, SearchResponse, Signal,
};

struct EngineInner {
    config: EngineConfig,
    repository: Arc<dyn KnowledgeRepository>,
    lexical: LexicalIndex,
    semantic: SemanticScorer,
    activation: ActivationEngine,
    items: RwLock<HashMap<String, Item>>,
}

/// Hybrid retrieval and activation engine. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Start building an engine.
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            repository: None,
            embedder: None,
            vectors: None,
        }
    }

    /// Open an engine over `repository`, restoring items and nodes.
    ///
    /// Must be called inside a Tokio runtime; the spreading worker is
    /// spawned here.
    pub async fn open(
        config: EngineConfig,
        repository: Arc<dyn KnowledgeRepository>,
        embedder: Option<Arc<dyn Embedder>>,
        vectors: Arc<dyn VectorIndex>,
    ) -> EngramResult<Self> {
        config.validate()?;

        let semantic = SemanticScorer::new(embedder, vectors, config.search.semantic_timeout());
        let activation = ActivationEngine::start(config.activation.clone(), config.worker.clone());

        let items = repository.list_items().await?;
        let restored = activation.graph().restore(repository.load_nodes().await?)?;
        let mut created = 0;
        for item in &items {
            if activation
                .graph()
                .ensure_node(&item.id, item.kind, item.created_at)?
            {
                created += 1;
            }
        }

        let lexical = LexicalIndex::new();
        if !items.is_empty() {
            lexical.rebuild(&items)?;
        }

        info!(
            items = items.len(),
            restored_nodes = restored,
            new_nodes = created,
            semantic = semantic.is_enabled(),
            "Engine opened"
        );

        let items = items.into_iter().map(|i| (i.id.clone(), i)).collect();
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                repository,
                lexical,
                semantic,
                activation,
                items: RwLock::new(items),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The activation engine, for direct graph manipulation.
    pub fn activation(&self) -> &ActivationEngine {
        &self.inner.activation
    }

    fn read_items(&self) -> EngramResult<std::sync::RwLockReadGuard<'_, HashMap<String, Item>>> {
        self.inner
            .items
            .read()
            .map_err(|e| EngramError::internal(format!("item cache lock poisoned: {}", e)))
    }

    fn write_items(&self) -> EngramResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Item>>> {
        self.inner
            .items
            .write()
            .map_err(|e| EngramError::internal(format!("item cache lock poisoned: {}", e)))
    }

    /// Whether an embedding provider is configured.
    pub fn semantic_enabled(&self) -> bool {
        self.inner.semantic.is_enabled()
    }

    /// Number of items known to the engine.
    pub fn item_count(&self) -> EngramResult<usize> {
        Ok(self.read_items()?.len())
    }

    /// Cached copy of an item.
    pub fn get_item(&self, id: &str) -> EngramResult<Option<Item>> {
        Ok(self.read_items()?.get(id).cloned())
    }

    /// Rebuild the term index from the current corpus. Returns the number
    /// of indexed documents.
    pub fn rebuild_index(&self) -> EngramResult<usize> {
        // The cache stays read-locked through the build so an insert racing
        // with it re-marks the index dirty after the flag is cleared.
        let items = self.read_items()?;
        let corpus: Vec<Item> = items.values().cloned().collect();
        let index = self.inner.lexical.rebuild(&corpus)?;
        drop(items);
        Ok(index.doc_count())
    }

    fn current_index(&self) -> EngramResult<Option<Arc<TermIndex>>> {
        if self.inner.lexical.is_dirty() {
            self.rebuild_index()?;
        }
        self.inner.lexical.snapshot()
    }

    /// Add or replace an item.
    ///
    /// The item is persisted, queued for re-indexing and given a graph node.
    /// Replacing an item keeps the access history already recorded for it.
    /// With an embedding provider it is also embedded and auto-connected;
    /// embedding failures are logged and the item stays lexically indexed.
    #[instrument(skip(self, item), fields(item_id = %item.id))]
    pub async fn index_item(&self, mut item: Item) -> EngramResult<()> {
        if item.id.trim().is_empty() {
            return Err(EngramError::validation("item id must not be empty"));
        }
        if item.content.trim().is_empty() {
            return Err(EngramError::validation_with_suggestion(
                "item content must not be empty",
                "Provide some text to index",
            ));
        }

        {
            let items = self.read_items()?;
            if let Some(existing) = items.get(&item.id) {
                item.access_count = item.access_count.max(existing.access_count);
                item.last_accessed = item.last_accessed.max(existing.last_accessed);
            }
        }

        let inner = &self.inner;
        inner.repository.upsert_item(&item).await?;

        let id = item.id.clone();
        let text = item.searchable_text();
        let graph = inner.activation.graph();
        graph.ensure_node(&id, item.kind, item.created_at)?;

        self.write_items()?.insert(id.clone(), item);
        inner.lexical.mark_dirty();

        if inner.semantic.is_enabled() {
            match inner.semantic.index(&id, &text).await {
                Ok(()) => {
                    let outcome = inner
                        .activation
                        .auto_connect(
                            &id,
                            inner.semantic.vectors().as_ref(),
                            inner.config.activation.auto_connect_threshold,
                            inner.config.activation.max_auto_edges,
                        )
                        .await?;
                    self.persist_nodes(&outcome.linked).await?;
                }
                Err(e) => warn!(error = %e, "Embedding failed, item indexed lexically only"),
            }
        }

        self.persist_nodes(std::slice::from_ref(&id)).await?;
        debug!("Item indexed");
        Ok(())
    }

    /// Record a direct access to an item and boost its node.
    ///
    /// `boost` defaults to the configured access boost. Returns the node's
    /// new activation.
    #[instrument(skip(self))]
    pub async fn access_item(&self, id: &str, boost: Option<f32>) -> EngramResult<f32> {
        let boost = boost.unwrap_or(self.inner.config.activation.access_boost);
        if !boost.is_finite() || boost < 0.0 {
            return Err(EngramError::validation("boost must be finite and non-negative"));
        }

        let now = Utc::now();
        self.inner.repository.record_access(id, now).await?;
        let kind = {
            let mut items = self.write_items()?;
            match items.get_mut(id) {
                Some(item) => {
                    item.touch(now);
                    item.kind
                }
                None => ItemKind::default(),
            }
        };

        let graph = self.inner.activation.graph();
        graph.ensure_node(id, kind, now)?;
        let level = self.inner.activation.access(id, boost)?;
        self.persist_nodes(&[id.to_string()]).await?;
        Ok(level)
    }

    async fn persist_nodes(&self, ids: &[String]) -> EngramResult<()> {
        let graph = self.inner.activation.graph();
        for id in ids {
            if let Some(record) = graph.record(id)? {
                self.inner.repository.save_node(&record).await?;
            }
        }
        Ok(())
    }

    /// Hybrid search.
    ///
    /// Per-pass failures are recorded in the response and mark it
    /// `degraded`; only an empty query, invalid options or every enabled
    /// pass failing produce an error. Before the first index build the
    /// response is empty with `index_stale` set.
    #[instrument(skip(self, options), fields(limit = options.limit))]
    pub async fn search(&self, query: &str, options: &SearchOptions) -> EngramResult<SearchResponse> {
        if query.trim().is_empty() {
            return Err(EngramError::invalid_query("query must not be empty"));
        }
        options.validate()?;

        let Some(index) = self.current_index()? else {
            debug!("Search before first index build");
            return Ok(SearchResponse::stale());
        };

        let inner = &self.inner;
        let terms = tokenize(query);
        let pool = inner.config.search.candidate_pool.max(options.limit);
        let weights = options.weights;

        let lexical = async {
            if weights.bm25 <= 0.0 {
                return None;
            }
            Some(Ok(rank(&score(&index, &terms, &inner.config.bm25))))
        };

        let semantic = async {
            if weights.semantic <= 0.0 || !inner.semantic.is_enabled() {
                return None;
            }
            Some(
                inner
                    .semantic
                    .search(query, pool, options.similarity_threshold)
                    .await,
            )
        };

        let graph = async {
            if weights.graph <= 0.0 {
                return None;
            }
            let seeds = index.coverage(&terms);
            Some(inner.activation.graph().activate_from_seeds(&seeds, pool))
        };

        let (lexical, semantic, graph) = tokio::join!(lexical, semantic, graph);

        let mut passes = Vec::with_capacity(3);
        let mut lists = Vec::with_capacity(3);
        let mut failures = Vec::new();
        {
            let items = self.read_items()?;
            for (signal, output) in [
                (Signal::Lexical, lexical),
                (Signal::Semantic, semantic),
                (Signal::Graph, graph),
            ] {
                let status = match output {
                    None => PassStatus::Skipped,
                    Some(Err(e)) => {
                        warn!(signal = %signal, error = %e, "Retrieval pass failed, degrading");
                        failures.push(format!("{}: {}", signal, e));
                        PassStatus::Failed {
                            reason: e.to_string(),
                        }
                    }
                    Some(Ok(entries)) => {
                        let entries =
                            filter_entries(entries, &items, options.kind_filter, pool);
                        let hits = entries.len();
                        lists.push(RankedList::new(signal, weights.for_signal(signal), entries));
                        PassStatus::Completed { hits }
                    }
                };
                passes.push(PassReport { signal, status });
            }
        }

        if lists.is_empty() && !failures.is_empty() {
            return Err(EngramError::all_signals_unavailable(failures));
        }
        let degraded = !failures.is_empty();

        let mut fused = inner.config.fusion.fuse_weighted(&lists);
        let results = {
            let items = self.read_items()?;
            apply_temporal_decay(&mut fused, options.temporal_decay, Utc::now(), |id| {
                items.get(id).map(|i| i.updated_at)
            });

            let candidates: Vec<MmrCandidate> = fused
                .iter()
                .filter_map(|c| {
                    let item = items.get(&c.id)?;
                    Some(MmrCandidate::new(
                        c.id.clone(),
                        c.score,
                        token_set(&item.searchable_text()),
                    ))
                })
                .collect();
            let selected = mmr_select(&candidates, options.diversity_lambda, options.limit);

            let by_id: HashMap<&str, &FusedCandidate> =
                fused.iter().map(|c| (c.id.as_str(), c)).collect();
            let mut results = Vec::with_capacity(selected.len());
            for idx in selected {
                let id = candidates[idx].id.as_str();
                let (Some(item), Some(fused)) = (items.get(id), by_id.get(id)) else {
                    continue;
                };
                results.push(ScoredResult {
                    item: item.clone(),
                    bm25_score: fused.bm25_score,
                    semantic_score: fused.semantic_score,
                    graph_score: fused.graph_score,
                    combined_score: fused.score,
                    rank_position: results.len() + 1,
                    retrieval_method: fused.retrieval_method.clone(),
                });
            }
            results
        };

        if options.boost_on_read && !results.is_empty() {
            let ids: Vec<String> = results.iter().map(|r| r.item.id.clone()).collect();
            inner
                .activation
                .graph()
                .nudge(&ids, inner.config.activation.read_boost)?;
            self.persist_nodes(&ids).await?;
        }

        debug!(results = results.len(), degraded, "Search complete");
        Ok(SearchResponse {
            results,
            degraded,
            index_stale: false,
            passes,
        })
    }

    /// [`search`](Self::search) that never mutates activation.
    pub async fn peek(&self, query: &str, options: &SearchOptions) -> EngramResult<SearchResponse> {
        let options = options.clone().with_boost_on_read(false);
        self.search(query, &options).await
    }

    /// Group graph nodes with DBSCAN.
    #[instrument(skip(self, cancel))]
    pub async fn cluster(
        &self,
        options: ClusterOptions,
        cancel: CancellationToken,
    ) -> EngramResult<ClusterReport> {
        options.validate()?;
        let nodes = self.inner.activation.graph().nodes()?;
        let texts: HashMap<String, String> = {
            let items = self.read_items()?;
            nodes
                .iter()
                .filter_map(|n| items.get(&n.id).map(|i| (n.id.clone(), i.searchable_text())))
                .collect()
        };

        let vectors = self.inner.semantic.vectors();
        let embeddings: Vec<Option<Vec<f32>>> = match options.distance_kind {
            DistanceKind::Cosine => {
                try_join_all(nodes.iter().map(|n| vectors.get(&n.id))).await?
            }
            DistanceKind::Jaccard => vec![None; nodes.len()],
        };
        if cancel.is_cancelled() {
            return Err(EngramError::Cancelled("cluster analysis".to_string()));
        }

        let points = nodes
            .into_iter()
            .zip(embeddings)
            .map(|(node, embedding)| ClusterPoint {
                terms: texts
                    .get(&node.id)
                    .map(|t| token_set(t))
                    .unwrap_or_else(HashSet::new),
                id: node.id,
                kind: node.kind,
                embedding,
            })
            .collect();

        cluster::analyze(points, options, cancel).await
    }

    /// Activation levels of every node, most active first.
    pub fn activation_snapshot(&self) -> EngramResult<Vec<NodeSnapshot>> {
        self.inner.activation.graph().snapshot()
    }

    /// Stop the spreading worker and persist every node.
    pub async fn shutdown(&self) -> EngramResult<()> {
        self.inner.activation.shutdown().await?;
        let ids: Vec<String> = self
            .inner
            .activation
            .graph()
            .nodes()?
            .into_iter()
            .map(|n| n.id)
            .collect();
        self.persist_nodes(&ids).await?;
        info!(nodes = ids.len(), "Engine shut down");
        Ok(())
    }
}

/// Drop unknown ids and kind mismatches, then cap at `pool`.
fn filter_entries(
    entries: Vec<(String, f32)>,
    items: &HashMap<String, Item>,
    kind_filter: Option<ItemKind>,
    pool: usize,
) -> Vec<(String, f32)> {
    entries
        .into_iter()
        .filter(|(id, _)| match items.get(id) {
            Some(item) => kind_filter.map_or(true, |k| item.kind == k),
            None => false,
        })
        .take(pool)
        .collect()
}

/// Builder for [`Engine`]. Unset collaborators default to in-memory ones.
pub struct EngineBuilder {
    config: EngineConfig,
    repository: Option<Arc<dyn KnowledgeRepository>>,
    embedder: Option<Arc<dyn Embedder>>,
    vectors: Option<Arc<dyn VectorIndex>>,
}

impl EngineBuilder {
    pub fn repository(mut self, repository: Arc<dyn KnowledgeRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn vector_index(mut self, vectors: Arc<dyn VectorIndex>) -> Self {
        self.vectors = Some(vectors);
        self
    }

    pub async fn build(self) -> EngramResult<Engine> {
        let repository = self
            .repository
            .unwrap_or_else(|| Arc::new(InMemoryRepository::new()));
        let vectors = self
            .vectors
            .unwrap_or_else(|| Arc::new(InMemoryVectorIndex::new()));
        Engine::open(self.config, repository, self.embedder, vectors).await
    }
}
