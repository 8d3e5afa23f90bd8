//! Activation graph arena.
//!
//! Nodes and edges live in a petgraph `DiGraph` with an id → `NodeIndex`
//! map, both behind one mutex. Every mutation (access, spread, decay) takes
//! the lock for its whole duration, so a spread computes its BFS frontier
//! and applies its boosts atomically with respect to concurrent boosts.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::config::ActivationConfig;
use super::node::{ActivationNode, Connection, EdgeKind, NodeRecord, NodeSnapshot};
use crate::error::{EngramError, EngramResult};
use crate::types::ItemKind;

#[derive(Debug, Clone, Copy)]
struct EdgeData {
    strength: f32,
    kind: EdgeKind,
}

#[derive(Debug, Default)]
struct Arena {
    graph: DiGraph<ActivationNode, EdgeData>,
    index: HashMap<String, NodeIndex>,
}

impl Arena {
    fn idx(&self, id: &str) -> EngramResult<NodeIndex> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| EngramError::node_not_found(id))
    }

    fn outgoing(&self, idx: NodeIndex) -> Vec<(NodeIndex, f32)> {
        self.graph
            .edges(idx)
            .map(|e| (e.target(), e.weight().strength))
            .collect()
    }

    fn connections(&self, idx: NodeIndex) -> Vec<Connection> {
        self.graph
            .edges(idx)
            .map(|e| Connection {
                target_id: self.graph[e.target()].id.clone(),
                strength: e.weight().strength,
                kind: e.weight().kind,
            })
            .collect()
    }

    /// Insert or strengthen a directed edge. Returns true if it was new.
    fn upsert_edge(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        strength: f32,
        kind: EdgeKind,
    ) -> bool {
        let strength = strength.clamp(0.0, 1.0);
        match self.graph.find_edge(from, to) {
            Some(edge) => {
                let data = &mut self.graph[edge];
                data.strength = data.strength.max(strength);
                false
            }
            None => {
                self.graph.add_edge(from, to, EdgeData { strength, kind });
                true
            }
        }
    }
}

/// A node reached by one spread call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadHit {
    pub id: String,
    /// Hops from the source (1 for direct neighbors).
    pub hop: usize,
    /// Activation actually added after clamping.
    pub delta: f32,
}

/// Result of a spread call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpreadOutcome {
    pub source: String,
    pub reached: Vec<SpreadHit>,
}

/// Shared activation state for every node in the partition.
#[derive(Debug)]
pub struct ActivationGraph {
    arena: Mutex<Arena>,
    config: ActivationConfig,
}

impl ActivationGraph {
    pub fn new(config: ActivationConfig) -> Self {
        Self {
            arena: Mutex::new(Arena::default()),
            config,
        }
    }

    /// The configuration new nodes are created with.
    pub fn config(&self) -> &ActivationConfig {
        &self.config
    }

    fn lock(&self) -> EngramResult<MutexGuard<'_, Arena>> {
        self.arena
            .lock()
            .map_err(|e| EngramError::internal(format!("activation graph lock poisoned: {}", e)))
    }

    /// Number of nodes.
    pub fn len(&self) -> EngramResult<usize> {
        Ok(self.lock()?.graph.node_count())
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> EngramResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of directed edges.
    pub fn edge_count(&self) -> EngramResult<usize> {
        Ok(self.lock()?.graph.edge_count())
    }

    pub fn contains(&self, id: &str) -> EngramResult<bool> {
        Ok(self.lock()?.index.contains_key(id))
    }

    /// Create a node for a new item. Existing nodes only get their kind
    /// refreshed. Returns true if a node was created.
    pub fn ensure_node(
        &self,
        id: &str,
        kind: ItemKind,
        created_at: DateTime<Utc>,
    ) -> EngramResult<bool> {
        let mut arena = self.lock()?;
        if let Some(idx) = arena.index.get(id).copied() {
            arena.graph[idx].kind = kind;
            return Ok(false);
        }
        let node = ActivationNode::new(id, kind, created_at, &self.config);
        let idx = arena.graph.add_node(node);
        arena.index.insert(id.to_string(), idx);
        Ok(true)
    }

    /// Load persisted nodes. Edges to unknown targets are skipped.
    pub fn restore(&self, records: Vec<NodeRecord>) -> EngramResult<usize> {
        let mut arena = self.lock()?;
        let mut pending = Vec::new();

        for record in records {
            let id = record.node.id.clone();
            let idx = match arena.index.get(&id).copied() {
                Some(idx) => {
                    arena.graph[idx] = record.node;
                    idx
                }
                None => {
                    let idx = arena.graph.add_node(record.node);
                    arena.index.insert(id, idx);
                    idx
                }
            };
            pending.push((idx, record.connections));
        }

        let restored = pending.len();
        for (from, connections) in pending {
            for conn in connections {
                match arena.index.get(&conn.target_id).copied() {
                    Some(to) => {
                        arena.upsert_edge(from, to, conn.strength, conn.kind);
                    }
                    None => warn!(
                        source = %arena.graph[from].id,
                        target = %conn.target_id,
                        "Skipping edge to unknown node"
                    ),
                }
            }
        }
        debug!(nodes = restored, "Activation graph restored");
        Ok(restored)
    }

    /// Copy of a node's state.
    pub fn node(&self, id: &str) -> EngramResult<Option<ActivationNode>> {
        let arena = self.lock()?;
        Ok(arena.index.get(id).map(|&idx| arena.graph[idx].clone()))
    }

    /// Node plus outgoing connections, for persistence.
    pub fn record(&self, id: &str) -> EngramResult<Option<NodeRecord>> {
        let arena = self.lock()?;
        Ok(arena.index.get(id).map(|&idx| NodeRecord {
            node: arena.graph[idx].clone(),
            connections: arena.connections(idx),
        }))
    }

    /// Every node, for clustering.
    pub fn nodes(&self) -> EngramResult<Vec<ActivationNode>> {
        Ok(self.lock()?.graph.node_weights().cloned().collect())
    }

    /// Outgoing connections of a node.
    pub fn connections(&self, id: &str) -> EngramResult<Vec<Connection>> {
        let arena = self.lock()?;
        let idx = arena.idx(id)?;
        Ok(arena.connections(idx))
    }

    /// Add or strengthen a directed edge. Returns true if the edge was new.
    pub fn connect(
        &self,
        source: &str,
        target: &str,
        strength: f32,
        kind: EdgeKind,
    ) -> EngramResult<bool> {
        let mut arena = self.lock()?;
        let from = arena.idx(source)?;
        let to = arena.idx(target)?;
        Ok(arena.upsert_edge(from, to, strength, kind))
    }

    /// Add or strengthen edges in both directions.
    pub fn connect_both(
        &self,
        a: &str,
        b: &str,
        strength: f32,
        kind: EdgeKind,
    ) -> EngramResult<bool> {
        let mut arena = self.lock()?;
        let ia = arena.idx(a)?;
        let ib = arena.idx(b)?;
        let forward = arena.upsert_edge(ia, ib, strength, kind);
        let backward = arena.upsert_edge(ib, ia, strength, kind);
        Ok(forward || backward)
    }

    /// Direct access boost: add `amount`, bump the access counter and stamp
    /// the access time. Returns the new activation.
    pub fn boost(&self, id: &str, amount: f32, now: DateTime<Utc>) -> EngramResult<f32> {
        let mut arena = self.lock()?;
        let idx = arena.idx(id)?;
        let node = &mut arena.graph[idx];
        node.add_activation(amount);
        node.access_count += 1;
        node.last_accessed = Some(now);
        Ok(node.activation_strength)
    }

    /// Add `amount` to each listed node without counting an access.
    /// Unknown ids are ignored.
    pub fn nudge(&self, ids: &[String], amount: f32) -> EngramResult<usize> {
        let mut arena = self.lock()?;
        let mut touched = 0;
        for id in ids {
            if let Some(idx) = arena.index.get(id).copied() {
                arena.graph[idx].add_activation(amount);
                touched += 1;
            }
        }
        Ok(touched)
    }

    /// Spread `boost` outward from `source` for up to `max_depth` hops.
    ///
    /// A neighbor first reached at hop h over an edge of strength s receives
    /// `boost * s * attenuation^h`. No node is visited twice within a call,
    /// the source included.
    pub fn spread(
        &self,
        source: &str,
        boost: f32,
        max_depth: usize,
    ) -> EngramResult<SpreadOutcome> {
        let mut arena = self.lock()?;
        let src = arena.idx(source)?;
        let attenuation = self.config.attenuation;

        let mut visited: HashSet<NodeIndex> = HashSet::from([src]);
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::from([(src, 0)]);
        let mut reached = Vec::new();

        while let Some((current, hop)) = queue.pop_front() {
            if hop >= max_depth {
                continue;
            }
            let next_hop = hop + 1;
            let factor = attenuation.powi(next_hop as i32);

            for (neighbor, strength) in arena.outgoing(current) {
                if !visited.insert(neighbor) {
                    continue;
                }
                let node = &mut arena.graph[neighbor];
                let delta = node.add_activation(boost * strength * factor);
                reached.push(SpreadHit {
                    id: node.id.clone(),
                    hop: next_hop,
                    delta,
                });
                queue.push_back((neighbor, next_hop));
            }
        }

        Ok(SpreadOutcome {
            source: source.to_string(),
            reached,
        })
    }

    /// Apply continuous decay to every node up to `now`. Returns the number
    /// of nodes visited.
    pub fn decay_tick(&self, now: DateTime<Utc>) -> EngramResult<usize> {
        let mut arena = self.lock()?;
        let mut count = 0;
        for node in arena.graph.node_weights_mut() {
            node.decay_to(now);
            count += 1;
        }
        Ok(count)
    }

    /// Activation of every node, strongest first.
    pub fn snapshot(&self) -> EngramResult<Vec<NodeSnapshot>> {
        let arena = self.lock()?;
        let mut snapshot: Vec<NodeSnapshot> = arena
            .graph
            .node_indices()
            .map(|idx| {
                let node = &arena.graph[idx];
                NodeSnapshot {
                    id: node.id.clone(),
                    activation: node.activation_strength,
                    base_activation: node.base_activation,
                    access_count: node.access_count,
                    degree: arena.graph.edges(idx).count(),
                }
            })
            .collect();
        snapshot.sort_by(|a, b| {
            OrderedFloat(b.activation)
                .cmp(&OrderedFloat(a.activation))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(snapshot)
    }

    /// Graph retrieval pass.
    ///
    /// Spreads each `(id, weight)` seed over its node's propagation depth
    /// without touching stored state, then ranks every reached node by
    /// `seed_blend * activation + (1 - seed_blend) * min(received, 1)`.
    pub fn activate_from_seeds(
        &self,
        seeds: &[(String, f32)],
        limit: usize,
    ) -> EngramResult<Vec<(String, f32)>> {
        let arena = self.lock()?;
        let attenuation = self.config.attenuation;
        let mut received: HashMap<NodeIndex, f32> = HashMap::new();

        for (id, weight) in seeds {
            let Some(&src) = arena.index.get(id) else {
                continue;
            };
            let weight = weight.clamp(0.0, 1.0);
            *received.entry(src).or_insert(0.0) += weight;

            let max_depth = arena.graph[src].propagation_depth;
            let mut visited: HashSet<NodeIndex> = HashSet::from([src]);
            let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::from([(src, 0)]);
            while let Some((current, hop)) = queue.pop_front() {
                if hop >= max_depth {
                    continue;
                }
                let next_hop = hop + 1;
                let factor = attenuation.powi(next_hop as i32);
                for (neighbor, strength) in arena.outgoing(current) {
                    if !visited.insert(neighbor) {
                        continue;
                    }
                    *received.entry(neighbor).or_insert(0.0) += weight * strength * factor;
                    queue.push_back((neighbor, next_hop));
                }
            }
        }

        let blend = self.config.seed_blend;
        let mut ranked: Vec<(String, f32)> = received
            .into_iter()
            .filter(|(_, r)| *r > 0.0)
            .map(|(idx, r)| {
                let node = &arena.graph[idx];
                let score = blend * node.activation_strength + (1.0 - blend) * r.min(1.0);
                (node.id.clone(), score)
            })
            .collect();
        ranked.sort_by(|a, b| {
            OrderedFloat(b.1)
                .cmp(&OrderedFloat(a.1))
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(ids: &[&str]) -> ActivationGraph {
        let graph = ActivationGraph::new(ActivationConfig::default());
        let now = Utc::now();
        for id in ids {
            graph.ensure_node(id, ItemKind::Note, now).unwrap();
        }
        graph
    }

    fn activation(graph: &ActivationGraph, id: &str) -> f32 {
        graph.node(id).unwrap().unwrap().activation_strength
    }

    fn set_activation(graph: &ActivationGraph, id: &str, value: f32) {
        let mut arena = graph.lock().unwrap();
        let idx = arena.idx(id).unwrap();
        arena.graph[idx].activation_strength = value;
    }

    #[test]
    fn test_access_then_spread_scenario() {
        let graph = graph_with(&["A", "B"]);
        graph.connect_both("A", "B", 0.5, EdgeKind::Manual).unwrap();
        set_activation(&graph, "A", 0.2);
        set_activation(&graph, "B", 0.2);

        graph.boost("A", 0.4, Utc::now()).unwrap();
        let before = activation(&graph, "B");
        graph.spread("A", 0.4, 1).unwrap();
        let after = activation(&graph, "B");

        assert!((after - before - 0.1).abs() < 1e-6, "delta {}", after - before);
        assert!((activation(&graph, "A") - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_activation_clamped_after_large_boost() {
        let graph = graph_with(&["A", "B", "C"]);
        graph.connect_both("A", "B", 1.0, EdgeKind::Manual).unwrap();
        graph.connect_both("B", "C", 1.0, EdgeKind::Manual).unwrap();

        graph.boost("A", 10.0, Utc::now()).unwrap();
        graph.spread("A", 10.0, 3).unwrap();

        for snap in graph.snapshot().unwrap() {
            assert!((0.0..=1.0).contains(&snap.activation), "{:?}", snap);
        }
    }

    #[test]
    fn test_spread_never_visits_twice_with_cycles() {
        let graph = graph_with(&["A", "B", "C", "D"]);
        graph.connect_both("A", "B", 0.8, EdgeKind::Manual).unwrap();
        graph.connect_both("B", "C", 0.8, EdgeKind::Manual).unwrap();
        graph.connect_both("C", "A", 0.8, EdgeKind::Manual).unwrap();
        graph.connect_both("C", "D", 0.8, EdgeKind::Manual).unwrap();

        let outcome = graph.spread("A", 0.5, 2).unwrap();
        let ids: Vec<&str> = outcome.reached.iter().map(|h| h.id.as_str()).collect();
        let unique: HashSet<&str> = ids.iter().copied().collect();

        assert_eq!(ids.len(), unique.len());
        assert!(!unique.contains("A"));
        assert!(unique.contains("B") && unique.contains("C") && unique.contains("D"));
        assert!(outcome.reached.iter().all(|h| h.hop <= 2));
    }

    #[test]
    fn test_separate_spreads_can_reboost() {
        let graph = graph_with(&["A", "B"]);
        graph.connect("A", "B", 1.0, EdgeKind::Manual).unwrap();
        set_activation(&graph, "B", 0.0);

        graph.spread("A", 0.2, 1).unwrap();
        graph.spread("A", 0.2, 1).unwrap();
        assert!((activation(&graph, "B") - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_spread_respects_depth() {
        let graph = graph_with(&["A", "B", "C"]);
        graph.connect("A", "B", 1.0, EdgeKind::Manual).unwrap();
        graph.connect("B", "C", 1.0, EdgeKind::Manual).unwrap();

        let outcome = graph.spread("A", 0.5, 1).unwrap();
        assert_eq!(outcome.reached.len(), 1);
        assert_eq!(outcome.reached[0].id, "B");
    }

    #[test]
    fn test_spread_unknown_source() {
        let graph = graph_with(&["A"]);
        let err = graph.spread("missing", 0.5, 2).unwrap_err();
        assert!(matches!(err, EngramError::NotFound { .. }));
    }

    #[test]
    fn test_connect_keeps_max_strength() {
        let graph = graph_with(&["A", "B"]);
        assert!(graph.connect("A", "B", 0.4, EdgeKind::Semantic).unwrap());
        assert!(!graph.connect("A", "B", 0.9, EdgeKind::Semantic).unwrap());
        assert!(!graph.connect("A", "B", 0.2, EdgeKind::Semantic).unwrap());

        let conns = graph.connections("A").unwrap();
        assert_eq!(conns.len(), 1);
        assert!((conns[0].strength - 0.9).abs() < 1e-6);
        assert_eq!(graph.edge_count().unwrap(), 1);
    }

    #[test]
    fn test_boost_counts_access() {
        let graph = graph_with(&["A"]);
        set_activation(&graph, "A", 0.3);
        let now = Utc::now();
        let level = graph.boost("A", 0.1, now).unwrap();

        let node = graph.node("A").unwrap().unwrap();
        assert!((level - 0.4).abs() < 1e-6);
        assert_eq!(node.access_count, 1);
        assert_eq!(node.last_accessed, Some(now));
    }

    #[test]
    fn test_decay_tick_moves_all_nodes() {
        let graph = graph_with(&["A", "B"]);
        let later = Utc::now() + chrono::Duration::hours(24 * 365);
        assert_eq!(graph.decay_tick(later).unwrap(), 2);
        assert!((activation(&graph, "A") - 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_snapshot_sorted() {
        let graph = graph_with(&["A", "B", "C"]);
        set_activation(&graph, "A", 0.2);
        set_activation(&graph, "B", 0.9);
        set_activation(&graph, "C", 0.5);
        let ids: Vec<String> = graph.snapshot().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["B", "C", "A"]);
    }

    #[test]
    fn test_activate_from_seeds_is_read_only() {
        let graph = graph_with(&["A", "B", "C"]);
        graph.connect_both("A", "B", 1.0, EdgeKind::Manual).unwrap();
        let before = graph.snapshot().unwrap();

        let ranked = graph.activate_from_seeds(&[("A".to_string(), 1.0)], 10).unwrap();
        assert_eq!(graph.snapshot().unwrap(), before);

        let ids: Vec<&str> = ranked.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert!(!ids.contains(&"C"));
    }

    #[test]
    fn test_restore_round_trip() {
        let graph = graph_with(&["A", "B"]);
        graph.connect("A", "B", 0.7, EdgeKind::Reference).unwrap();
        let records = vec![
            graph.record("A").unwrap().unwrap(),
            graph.record("B").unwrap().unwrap(),
        ];

        let restored = ActivationGraph::new(ActivationConfig::default());
        assert_eq!(restored.restore(records).unwrap(), 2);
        let conns = restored.connections("A").unwrap();
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].target_id, "B");
        assert_eq!(conns[0].kind, EdgeKind::Reference);
    }
}
