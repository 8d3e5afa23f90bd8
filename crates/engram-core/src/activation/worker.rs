//! Background spreading worker.
//!
//! `access` enqueues a [`SpreadJob`] on a bounded channel; the worker drains
//! up to `batch_size` jobs per tick and applies continuous decay. A failed
//! job is logged and skipped without aborting the rest of its batch.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::WorkerConfig;
use super::graph::{ActivationGraph, SpreadOutcome};
use crate::error::{EngramError, EngramResult};

/// A queued request to spread activation from one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadJob {
    pub node_id: String,
    pub boost: f32,
    /// Hop limit; the node's own `propagation_depth` when `None`.
    pub depth: Option<usize>,
}

impl SpreadJob {
    pub fn new(node_id: impl Into<String>, boost: f32) -> Self {
        Self {
            node_id: node_id.into(),
            boost,
            depth: None,
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }
}

/// Counters for one drained batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub processed: usize,
    pub skipped: usize,
    /// Every sender is gone and the queue is empty.
    pub closed: bool,
}

/// Run one job against the graph.
pub fn process_job(graph: &ActivationGraph, job: &SpreadJob) -> EngramResult<SpreadOutcome> {
    let depth = match job.depth {
        Some(depth) => depth,
        None => {
            graph
                .node(&job.node_id)?
                .ok_or_else(|| EngramError::node_not_found(&job.node_id))?
                .propagation_depth
        }
    };
    graph.spread(&job.node_id, job.boost, depth)
}

/// Drain up to `batch_size` queued jobs without waiting.
pub fn drain_batch(
    graph: &ActivationGraph,
    rx: &mut mpsc::Receiver<SpreadJob>,
    batch_size: usize,
) -> BatchStats {
    let mut stats = BatchStats::default();
    for _ in 0..batch_size {
        let job = match rx.try_recv() {
            Ok(job) => job,
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                stats.closed = true;
                break;
            }
        };
        match process_job(graph, &job) {
            Ok(outcome) => {
                stats.processed += 1;
                debug!(
                    node_id = %job.node_id,
                    reached = outcome.reached.len(),
                    "Spread job applied"
                );
            }
            Err(e) => {
                stats.skipped += 1;
                warn!(node_id = %job.node_id, error = %e, "Skipping spread job");
            }
        }
    }
    stats
}

/// Spawn the worker loop on the current tokio runtime.
///
/// The loop exits when `cancel` fires or every sender has been dropped.
pub fn spawn_worker(
    graph: Arc<ActivationGraph>,
    mut rx: mpsc::Receiver<SpreadJob>,
    config: WorkerConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(config.tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            tick_ms = config.tick_interval_ms,
            batch_size = config.batch_size,
            "Spreading worker started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Spreading worker cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    if config.decay_on_tick {
                        if let Err(e) = graph.decay_tick(Utc::now()) {
                            warn!(error = %e, "Decay tick failed");
                        }
                    }
                    let stats = drain_batch(&graph, &mut rx, config.batch_size);
                    if stats.processed + stats.skipped > 0 {
                        debug!(
                            processed = stats.processed,
                            skipped = stats.skipped,
                            "Spread batch drained"
                        );
                    }
                    if stats.closed {
                        info!("Spread queue closed, worker exiting");
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{ActivationConfig, EdgeKind};
    use crate::types::ItemKind;

    fn graph() -> Arc<ActivationGraph> {
        let graph = ActivationGraph::new(ActivationConfig {
            initial_activation: 0.2,
            ..Default::default()
        });
        let now = Utc::now();
        for id in ["A", "B"] {
            graph.ensure_node(id, ItemKind::Note, now).unwrap();
        }
        graph.connect_both("A", "B", 1.0, EdgeKind::Manual).unwrap();
        Arc::new(graph)
    }

    #[tokio::test]
    async fn test_drain_batch_skips_unknown_nodes() {
        let graph = graph();
        let (tx, mut rx) = mpsc::channel(16);
        tx.send(SpreadJob::new("ghost", 0.5)).await.unwrap();
        tx.send(SpreadJob::new("A", 0.5)).await.unwrap();

        let stats = drain_batch(&graph, &mut rx, 5);
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.skipped, 1);
        assert!(!stats.closed);
    }

    #[tokio::test]
    async fn test_drain_batch_respects_batch_size() {
        let graph = graph();
        let (tx, mut rx) = mpsc::channel(16);
        for _ in 0..7 {
            tx.send(SpreadJob::new("A", 0.1).with_depth(1)).await.unwrap();
        }

        assert_eq!(drain_batch(&graph, &mut rx, 5).processed, 5);
        assert_eq!(drain_batch(&graph, &mut rx, 5).processed, 2);
    }

    #[tokio::test]
    async fn test_drain_batch_reports_closed() {
        let graph = graph();
        let (tx, mut rx) = mpsc::channel::<SpreadJob>(4);
        drop(tx);
        assert!(drain_batch(&graph, &mut rx, 5).closed);
    }

    #[tokio::test]
    async fn test_worker_applies_jobs_and_stops() {
        let graph = graph();
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let config = WorkerConfig {
            tick_interval_ms: 10,
            decay_on_tick: false,
            ..Default::default()
        };
        let handle = spawn_worker(Arc::clone(&graph), rx, config, cancel.clone());

        tx.send(SpreadJob::new("A", 0.4).with_depth(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let b = graph.node("B").unwrap().unwrap();
        assert!((b.activation_strength - 0.4).abs() < 1e-6);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_worker_exits_when_senders_dropped() {
        let graph = graph();
        let (tx, rx) = mpsc::channel::<SpreadJob>(4);
        let config = WorkerConfig {
            tick_interval_ms: 5,
            ..Default::default()
        };
        let handle = spawn_worker(graph, rx, config, CancellationToken::new());
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
