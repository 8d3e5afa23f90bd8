//! Graph activation engine.
//!
//! Node activation levels and weighted edges over the knowledge graph, with
//! spreading activation, continuous decay and similarity-based
//! auto-connection. Direct accesses are applied immediately; the spread they
//! trigger runs on the background worker.

mod config;
mod graph;
mod node;
mod worker;

pub use config::{ActivationConfig, WorkerConfig};
pub use graph::{ActivationGraph, SpreadHit, SpreadOutcome};
pub use node::{ActivationNode, Connection, EdgeKind, NodeRecord, NodeSnapshot};
pub use worker::{drain_batch, process_job, spawn_worker, BatchStats, SpreadJob};

use std::sync::{Arc, Mutex};

use chrono::Utc;
use ordered_float::OrderedFloat;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{EngramError, EngramResult};
use crate::traits::VectorIndex;
use crate::types::ItemKind;

/// Edges touched by [`ActivationEngine::auto_connect`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutoConnectOutcome {
    /// Node pairs connected for the first time.
    pub created: usize,
    /// Every neighbor whose edge pair was created or strengthened.
    pub linked: Vec<String>,
}

/// Activation graph plus the queue feeding its background worker.
pub struct ActivationEngine {
    graph: Arc<ActivationGraph>,
    jobs: mpsc::Sender<SpreadJob>,
    worker: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl ActivationEngine {
    /// Create the engine and spawn its worker on the current runtime.
    pub fn start(config: ActivationConfig, worker: WorkerConfig) -> Self {
        let graph = Arc::new(ActivationGraph::new(config));
        let (jobs, rx) = mpsc::channel(worker.queue_capacity);
        let cancel = CancellationToken::new();
        let handle = spawn_worker(Arc::clone(&graph), rx, worker, cancel.clone());

        Self {
            graph,
            jobs,
            worker: Mutex::new(Some(handle)),
            cancel,
        }
    }

    /// Shared graph handle.
    pub fn graph(&self) -> &Arc<ActivationGraph> {
        &self.graph
    }

    /// Boost a node directly and queue a spread from it.
    ///
    /// The direct boost is always applied; if the queue is full the spread
    /// is dropped and logged. Returns the node's new activation.
    pub fn access(&self, node_id: &str, boost: f32) -> EngramResult<f32> {
        let level = self.graph.boost(node_id, boost, Utc::now())?;

        match self.jobs.try_send(SpreadJob::new(node_id, boost)) {
            Ok(()) => debug!(node_id, boost, "Spread job queued"),
            Err(TrySendError::Full(job)) => {
                warn!(node_id = %job.node_id, "Spread queue full, dropping job")
            }
            Err(TrySendError::Closed(job)) => {
                warn!(node_id = %job.node_id, "Spread worker stopped, dropping job")
            }
        }
        Ok(level)
    }

    /// Spread synchronously from `source_id`.
    pub fn spread(
        &self,
        source_id: &str,
        boost: f32,
        max_depth: usize,
    ) -> EngramResult<SpreadOutcome> {
        self.graph.spread(source_id, boost, max_depth)
    }

    /// Connect `node_id` to its most similar graph neighbors.
    ///
    /// Candidates at or above `similarity_threshold` are ordered by similarity,
    /// then by most recently created, and capped at `max_new_edges`. Edges go
    /// both ways; an existing edge keeps the larger strength.
    pub async fn auto_connect(
        &self,
        node_id: &str,
        vectors: &dyn VectorIndex,
        similarity_threshold: f32,
        max_new_edges: usize,
    ) -> EngramResult<AutoConnectOutcome> {
        if max_new_edges == 0 {
            return Ok(AutoConnectOutcome::default());
        }
        if !self.graph.contains(node_id)? {
            return Err(EngramError::node_not_found(node_id));
        }
        let Some(vector) = vectors.get(node_id).await? else {
            debug!(node_id, "No embedding, skipping auto-connect");
            return Ok(AutoConnectOutcome::default());
        };

        let total = vectors.len().await?;
        let matches = vectors
            .similarity_search(&vector, total, similarity_threshold)
            .await?;

        let mut candidates = Vec::new();
        for m in matches {
            if m.id == node_id {
                continue;
            }
            if let Some(node) = self.graph.node(&m.id)? {
                candidates.push((m.id, m.similarity, node.created_at));
            }
        }
        candidates.sort_by(|a, b| {
            OrderedFloat(b.1)
                .cmp(&OrderedFloat(a.1))
                .then_with(|| b.2.cmp(&a.2))
        });
        candidates.truncate(max_new_edges);

        let mut outcome = AutoConnectOutcome::default();
        for (target, similarity, _) in candidates {
            if self
                .graph
                .connect_both(node_id, &target, similarity, EdgeKind::Semantic)?
            {
                outcome.created += 1;
            }
            outcome.linked.push(target);
        }
        if !outcome.linked.is_empty() {
            debug!(
                node_id,
                created = outcome.created,
                linked = outcome.linked.len(),
                "Auto-connected node"
            );
        }
        Ok(outcome)
    }

    /// Semantic similarity over graph nodes.
    ///
    /// With `boost_on_read`, every returned node receives the configured
    /// read boost.
    pub async fn search(
        &self,
        query_vector: &[f32],
        vectors: &dyn VectorIndex,
        kind_filter: Option<ItemKind>,
        limit: usize,
        similarity_threshold: f32,
        boost_on_read: bool,
    ) -> EngramResult<Vec<(String, f32)>> {
        let total = vectors.len().await?;
        let matches = vectors
            .similarity_search(query_vector, total, similarity_threshold)
            .await?;

        let mut results = Vec::new();
        for m in matches {
            if results.len() >= limit {
                break;
            }
            let Some(node) = self.graph.node(&m.id)? else {
                continue;
            };
            if kind_filter.is_some_and(|k| k != node.kind) {
                continue;
            }
            results.push((m.id, m.similarity));
        }

        if boost_on_read && !results.is_empty() {
            let ids: Vec<String> = results.iter().map(|(id, _)| id.clone()).collect();
            self.graph.nudge(&ids, self.graph.config().read_boost)?;
        }
        Ok(results)
    }

    /// [`search`](Self::search) without boost-on-read.
    pub async fn peek(
        &self,
        query_vector: &[f32],
        vectors: &dyn VectorIndex,
        kind_filter: Option<ItemKind>,
        limit: usize,
        similarity_threshold: f32,
    ) -> EngramResult<Vec<(String, f32)>> {
        self.search(
            query_vector,
            vectors,
            kind_filter,
            limit,
            similarity_threshold,
            false,
        )
        .await
    }

    /// Cancel the worker and wait for it to exit.
    pub async fn shutdown(&self) -> EngramResult<()> {
        self.cancel.cancel();
        let handle = self
            .worker
            .lock()
            .map_err(|e| EngramError::internal(format!("worker handle lock poisoned: {}", e)))?
            .take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| EngramError::internal(format!("spreading worker panicked: {}", e)))?;
            info!("Activation engine stopped");
        }
        Ok(())
    }
}

impl Drop for ActivationEngine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::InMemoryVectorIndex;

    fn engine() -> ActivationEngine {
        ActivationEngine::start(
            ActivationConfig {
                initial_activation: 0.2,
                ..Default::default()
            },
            WorkerConfig {
                tick_interval_ms: 10,
                decay_on_tick: false,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_access_boosts_and_queues_spread() {
        let engine = engine();
        let graph = engine.graph();
        let now = Utc::now();
        graph.ensure_node("A", ItemKind::Note, now).unwrap();
        graph.ensure_node("B", ItemKind::Note, now).unwrap();
        graph.connect_both("A", "B", 0.5, EdgeKind::Manual).unwrap();

        let level = engine.access("A", 0.4).unwrap();
        assert!((level - 0.6).abs() < 1e-6);

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let b = graph.node("B").unwrap().unwrap();
        assert!((b.activation_strength - 0.3).abs() < 1e-6);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_access_unknown_node() {
        let engine = engine();
        assert!(matches!(
            engine.access("missing", 0.1),
            Err(EngramError::NotFound { .. })
        ));
        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_auto_connect_orders_by_similarity_then_recency() {
        let engine = engine();
        let graph = engine.graph();
        let vectors = InMemoryVectorIndex::new();
        let base = Utc::now();

        graph.ensure_node("src", ItemKind::Note, base).unwrap();
        graph
            .ensure_node("old", ItemKind::Note, base - chrono::Duration::days(2))
            .unwrap();
        graph
            .ensure_node("new", ItemKind::Note, base - chrono::Duration::days(1))
            .unwrap();
        graph.ensure_node("far", ItemKind::Note, base).unwrap();

        vectors.upsert("src", vec![1.0, 0.0]).await.unwrap();
        vectors.upsert("old", vec![1.0, 0.1]).await.unwrap();
        vectors.upsert("new", vec![1.0, 0.1]).await.unwrap();
        vectors.upsert("far", vec![0.0, 1.0]).await.unwrap();

        let outcome = engine.auto_connect("src", &vectors, 0.8, 1).await.unwrap();
        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.linked, vec!["new".to_string()]);

        let conns = graph.connections("src").unwrap();
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].target_id, "new");
        assert_eq!(conns[0].kind, EdgeKind::Semantic);
        assert_eq!(graph.connections("new").unwrap()[0].target_id, "src");

        // Re-running does not duplicate edges but still reports the neighbor.
        let again = engine.auto_connect("src", &vectors, 0.8, 1).await.unwrap();
        assert_eq!(again.created, 0);
        assert_eq!(again.linked, vec!["new".to_string()]);
        assert_eq!(graph.edge_count().unwrap(), 2);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_search_boost_on_read_is_opt_in() {
        let engine = engine();
        let graph = engine.graph();
        let vectors = InMemoryVectorIndex::new();
        graph.ensure_node("a", ItemKind::Fact, Utc::now()).unwrap();
        graph.ensure_node("b", ItemKind::Note, Utc::now()).unwrap();
        vectors.upsert("a", vec![1.0, 0.0]).await.unwrap();
        vectors.upsert("b", vec![0.9, 0.1]).await.unwrap();

        let peeked = engine.peek(&[1.0, 0.0], &vectors, None, 10, 0.5).await.unwrap();
        assert_eq!(peeked.len(), 2);
        assert!((graph.node("a").unwrap().unwrap().activation_strength - 0.2).abs() < 1e-6);

        let found = engine
            .search(&[1.0, 0.0], &vectors, Some(ItemKind::Fact), 10, 0.5, true)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "a");
        assert!((graph.node("a").unwrap().unwrap().activation_strength - 0.25).abs() < 1e-6);
        assert!((graph.node("b").unwrap().unwrap().activation_strength - 0.2).abs() < 1e-6);

        engine.shutdown().await.unwrap();
    }
}
