//! Activation node and edge types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use super::config::ActivationConfig;
use crate::types::ItemKind;

/// Why two nodes are connected.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Created by auto-connect from embedding similarity.
    #[default]
    Semantic,
    /// One item cites another.
    Reference,
    /// Items created close together.
    Temporal,
    /// Added by a caller.
    Manual,
}

/// Directed edge to `target_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub target_id: String,
    /// Edge weight in [0, 1].
    pub strength: f32,
    pub kind: EdgeKind,
}

/// Per-item activation state held in the graph arena.
///
/// Outgoing connections live on the arena's edges; see [`NodeRecord`] for
/// the persisted form that carries them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationNode {
    /// Same id as the item.
    pub id: String,
    /// Kind of the backing item.
    #[serde(default)]
    pub kind: ItemKind,
    /// Current activation in [0, 1].
    pub activation_strength: f32,
    /// Floor that decay approaches.
    pub base_activation: f32,
    /// Fraction of the gap to `base_activation` lost per hour, in (0, 1].
    pub decay_rate: f32,
    /// Maximum hops for spreading from this node.
    pub propagation_depth: usize,
    #[serde(default)]
    pub access_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Time decay was last applied.
    pub last_decayed_at: DateTime<Utc>,
}

impl ActivationNode {
    /// New node at the configured initial activation.
    pub fn new(
        id: impl Into<String>,
        kind: ItemKind,
        created_at: DateTime<Utc>,
        config: &ActivationConfig,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            activation_strength: config.initial_activation.clamp(0.0, 1.0),
            base_activation: config.base_activation,
            decay_rate: config.decay_rate,
            propagation_depth: config.propagation_depth,
            access_count: 0,
            last_accessed: None,
            created_at,
            last_decayed_at: Utc::now(),
        }
    }

    /// Add `amount` and clamp to [0, 1]. Returns the applied delta.
    pub fn add_activation(&mut self, amount: f32) -> f32 {
        let before = self.activation_strength;
        self.activation_strength = (before + amount).clamp(0.0, 1.0);
        self.activation_strength - before
    }

    /// Move toward `base_activation` for the time elapsed up to `now`.
    pub fn decay_to(&mut self, now: DateTime<Utc>) {
        let elapsed_ms = (now - self.last_decayed_at).num_milliseconds();
        if elapsed_ms <= 0 {
            return;
        }
        let hours = elapsed_ms as f64 / 3_600_000.0;
        let retain = (1.0 - self.decay_rate as f64).powf(hours) as f32;
        let base = self.base_activation;
        self.activation_strength =
            (base + (self.activation_strength - base) * retain).clamp(0.0, 1.0);
        self.last_decayed_at = now;
    }
}

/// A node together with its outgoing connections, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(flatten)]
    pub node: ActivationNode,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

/// Read-only view returned by `snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub activation: f32,
    pub base_activation: f32,
    pub access_count: u64,
    /// Number of outgoing edges.
    pub degree: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn node() -> ActivationNode {
        ActivationNode::new("n", ItemKind::Note, Utc::now(), &ActivationConfig::default())
    }

    #[test]
    fn test_new_node_starts_fully_active() {
        let n = node();
        assert_eq!(n.activation_strength, 1.0);
        assert!((n.base_activation - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_add_activation_clamps() {
        let mut n = node();
        n.activation_strength = 0.5;
        let applied = n.add_activation(10.0);
        assert_eq!(n.activation_strength, 1.0);
        assert!((applied - 0.5).abs() < 1e-6);

        n.add_activation(-10.0);
        assert_eq!(n.activation_strength, 0.0);
    }

    #[test]
    fn test_decay_approaches_base() {
        let mut n = node();
        n.decay_rate = 0.5;
        let start = n.last_decayed_at;

        n.decay_to(start + Duration::hours(1));
        // 0.1 + 0.9 * 0.5
        assert!((n.activation_strength - 0.55).abs() < 1e-4);

        n.decay_to(start + Duration::hours(1000));
        assert!((n.activation_strength - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_decay_raises_toward_base() {
        let mut n = node();
        n.activation_strength = 0.0;
        n.decay_rate = 1.0;
        let start = n.last_decayed_at;
        n.decay_to(start + Duration::minutes(30));
        assert!((n.activation_strength - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_decay_ignores_past_timestamps() {
        let mut n = node();
        let start = n.last_decayed_at;
        n.decay_to(start - Duration::hours(5));
        assert_eq!(n.activation_strength, 1.0);
        assert_eq!(n.last_decayed_at, start);
    }

    #[test]
    fn test_edge_kind_strings() {
        assert_eq!(EdgeKind::Reference.to_string(), "reference");
        let parsed: EdgeKind = "manual".parse().unwrap();
        assert_eq!(parsed, EdgeKind::Manual);
    }
}
