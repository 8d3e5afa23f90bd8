//! Search options and per-request result types.
//!
//! Everything here lives for the duration of one search response and is
//! never persisted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::item::{Item, ItemKind};
use crate::error::{EngramError, EngramResult};

/// One of the three independent retrieval passes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// BM25 over the term index.
    Lexical,
    /// Embedding similarity.
    Semantic,
    /// Graph spreading activation.
    Graph,
}

/// The set of passes that contributed a result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetrievalMethod(BTreeSet<Signal>);

impl RetrievalMethod {
    /// Record that `signal` contributed.
    pub fn insert(&mut self, signal: Signal) {
        self.0.insert(signal);
    }

    /// Whether `signal` contributed.
    pub fn contains(&self, signal: Signal) -> bool {
        self.0.contains(&signal)
    }

    /// Number of contributing passes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no pass contributed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when more than one pass contributed.
    pub fn is_hybrid(&self) -> bool {
        self.0.len() > 1
    }

    /// Human-readable tag, e.g. `lexical+graph`.
    pub fn label(&self) -> String {
        self.0
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("+")
    }
}

impl FromIterator<Signal> for RetrievalMethod {
    fn from_iter<T: IntoIterator<Item = Signal>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// RRF weight for each pass. A zero weight disables the pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub bm25: f32,
    pub semantic: f32,
    pub graph: f32,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            bm25: 1.0,
            semantic: 1.0,
            graph: 0.5,
        }
    }
}

impl SignalWeights {
    /// Weight for a given pass.
    pub fn for_signal(&self, signal: Signal) -> f32 {
        match signal {
            Signal::Lexical => self.bm25,
            Signal::Semantic => self.semantic,
            Signal::Graph => self.graph,
        }
    }

    /// Whether a pass should run at all.
    pub fn enabled(&self, signal: Signal) -> bool {
        self.for_signal(signal) > 0.0
    }

    /// Validate that weights are finite and non-negative.
    pub fn validate(&self) -> Result<(), &'static str> {
        for w in [self.bm25, self.semantic, self.graph] {
            if !w.is_finite() || w < 0.0 {
                return Err("signal weights must be finite and non-negative");
            }
        }
        if self.bm25 + self.semantic + self.graph <= 0.0 {
            return Err("at least one signal weight must be positive");
        }
        Ok(())
    }
}

/// Options for a single search call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Restrict results to one kind.
    pub kind_filter: Option<ItemKind>,
    /// Maximum number of results returned.
    pub limit: usize,
    /// Minimum cosine similarity for the semantic pass.
    pub similarity_threshold: f32,
    /// Per-pass RRF weights.
    pub weights: SignalWeights,
    /// MMR trade-off; 1.0 is pure relevance.
    pub diversity_lambda: f32,
    /// Per-day exponential decay applied after fusion; 0 disables.
    pub temporal_decay: f32,
    /// Boost the activation of every returned node.
    ///
    /// This turns the read into a write. Off by default.
    pub boost_on_read: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            kind_filter: None,
            limit: 10,
            similarity_threshold: 0.7,
            weights: SignalWeights::default(),
            diversity_lambda: 0.7,
            temporal_decay: 0.0,
            boost_on_read: false,
        }
    }
}

impl SearchOptions {
    /// Set custom limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Restrict to a kind.
    pub fn with_kind(mut self, kind: ItemKind) -> Self {
        self.kind_filter = Some(kind);
        self
    }

    /// Set custom weights.
    pub fn with_weights(mut self, weights: SignalWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Set the temporal decay factor.
    pub fn with_temporal_decay(mut self, factor: f32) -> Self {
        self.temporal_decay = factor;
        self
    }

    /// Set the MMR lambda.
    pub fn with_diversity(mut self, lambda: f32) -> Self {
        self.diversity_lambda = lambda;
        self
    }

    /// Opt in to boosting returned nodes.
    pub fn with_boost_on_read(mut self, enable: bool) -> Self {
        self.boost_on_read = enable;
        self
    }

    /// Validate option ranges.
    pub fn validate(&self) -> EngramResult<()> {
        if self.limit == 0 {
            return Err(EngramError::validation("limit must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(EngramError::validation(
                "similarity_threshold must be between 0.0 and 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.diversity_lambda) {
            return Err(EngramError::validation(
                "diversity_lambda must be between 0.0 and 1.0",
            ));
        }
        if !self.temporal_decay.is_finite() || self.temporal_decay < 0.0 {
            return Err(EngramError::validation(
                "temporal_decay must be finite and non-negative",
            ));
        }
        self.weights.validate().map_err(EngramError::validation)
    }
}

/// A ranked search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredResult {
    /// The matched item.
    pub item: Item,
    /// Raw BM25 score; `None` when the lexical pass did not return the item.
    pub bm25_score: Option<f32>,
    /// Cosine similarity; `None` when the semantic pass did not return the item.
    pub semantic_score: Option<f32>,
    /// Graph activation score; `None` when the graph pass did not return the item.
    pub graph_score: Option<f32>,
    /// Fused (and optionally decayed) score.
    pub combined_score: f32,
    /// 1-based position in the final list.
    pub rank_position: usize,
    /// Passes that contributed.
    pub retrieval_method: RetrievalMethod,
}

/// Outcome of one retrieval pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassStatus {
    /// The pass ran and returned `hits` candidates.
    Completed { hits: usize },
    /// The pass was disabled by a zero weight or missing backend.
    Skipped,
    /// The pass failed; the search degraded around it.
    Failed { reason: String },
}

/// Per-pass report attached to a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub signal: Signal,
    #[serde(flatten)]
    pub status: PassStatus,
}

/// Full response for a search call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Ranked results.
    pub results: Vec<ScoredResult>,
    /// True when an enabled pass failed.
    pub degraded: bool,
    /// True when no index had been built yet.
    pub index_stale: bool,
    /// Per-pass diagnostics.
    pub passes: Vec<PassReport>,
}

impl SearchResponse {
    /// Empty response flagged as stale.
    pub fn stale() -> Self {
        Self {
            index_stale: true,
            ..Default::default()
        }
    }

    /// Report for a single pass, if present.
    pub fn pass(&self, signal: Signal) -> Option<&PassReport> {
        self.passes.iter().find(|p| p.signal == signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_method_label() {
        let method: RetrievalMethod = [Signal::Graph, Signal::Lexical].into_iter().collect();
        assert_eq!(method.label(), "lexical+graph");
        assert!(method.is_hybrid());
        assert!(!method.contains(Signal::Semantic));

        let json = serde_json::to_string(&method).unwrap();
        assert_eq!(json, r#"["lexical","graph"]"#);
    }

    #[test]
    fn test_default_options() {
        let options = SearchOptions::default();
        assert_eq!(options.limit, 10);
        assert!((options.similarity_threshold - 0.7).abs() < f32::EPSILON);
        assert!((options.diversity_lambda - 0.7).abs() < f32::EPSILON);
        assert_eq!(options.temporal_decay, 0.0);
        assert!(!options.boost_on_read);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_validation() {
        assert!(SearchOptions::default().with_limit(0).validate().is_err());
        assert!(SearchOptions::default().with_diversity(1.5).validate().is_err());
        assert!(SearchOptions::default()
            .with_temporal_decay(-0.1)
            .validate()
            .is_err());

        let zero = SignalWeights {
            bm25: 0.0,
            semantic: 0.0,
            graph: 0.0,
        };
        assert!(SearchOptions::default().with_weights(zero).validate().is_err());
    }

    #[test]
    fn test_zero_weight_disables_pass() {
        let weights = SignalWeights {
            semantic: 0.0,
            ..Default::default()
        };
        assert!(weights.enabled(Signal::Lexical));
        assert!(!weights.enabled(Signal::Semantic));
    }

    #[test]
    fn test_pass_report_serialization() {
        let report = PassReport {
            signal: Signal::Semantic,
            status: PassStatus::Failed {
                reason: "timeout".to_string(),
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["signal"], "semantic");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "timeout");
    }
}
