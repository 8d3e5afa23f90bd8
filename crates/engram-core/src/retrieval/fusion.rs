//! Score fusion for hybrid retrieval.
//!
//! Combines the ranked lists of the lexical, semantic and graph passes with
//! weighted Reciprocal Rank Fusion, then optionally applies temporal decay.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::types::{RetrievalMethod, Signal};

/// One pass's ranked output, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedList {
    pub signal: Signal,
    pub weight: f32,
    /// `(id, raw score)` sorted by score descending.
    pub entries: Vec<(String, f32)>,
}

impl RankedList {
    pub fn new(signal: Signal, weight: f32, entries: Vec<(String, f32)>) -> Self {
        Self {
            signal,
            weight,
            entries,
        }
    }
}

/// A fused candidate with the raw per-pass scores it was built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusedCandidate {
    pub id: String,
    pub score: f32,
    pub bm25_score: Option<f32>,
    pub semantic_score: Option<f32>,
    pub graph_score: Option<f32>,
    pub retrieval_method: RetrievalMethod,
}

impl FusedCandidate {
    fn record(&mut self, signal: Signal, raw: f32) {
        match signal {
            Signal::Lexical => self.bm25_score = Some(raw),
            Signal::Semantic => self.semantic_score = Some(raw),
            Signal::Graph => self.graph_score = Some(raw),
        }
        self.retrieval_method.insert(signal);
    }
}

fn sort_desc<T>(items: &mut [T], score: impl Fn(&T) -> f32, id: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| {
        OrderedFloat(score(b))
            .cmp(&OrderedFloat(score(a)))
            .then_with(|| id(a).cmp(id(b)))
    });
}

/// Reciprocal Rank Fusion for combining ranked lists.
///
/// An item at 0-based rank `r` in a list of weight `w` contributes
/// `w / (k + r + 1)`. Items absent from a list get nothing from it.
///
/// Reference: Cormack, Clarke & Buettcher (2009)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RrfFusion {
    /// k parameter controls how much to favor top-ranked items.
    /// Higher k = more even distribution; lower k = more weight to top ranks.
    /// Default: 60 (standard value from literature)
    pub k: f32,
}

impl Default for RrfFusion {
    fn default() -> Self {
        Self { k: 60.0 }
    }
}

impl RrfFusion {
    /// Create RRF fusion with custom k value.
    pub fn new(k: f32) -> Self {
        Self { k }
    }

    /// Contribution of one list entry.
    pub fn contribution(&self, weight: f32, rank: usize) -> f32 {
        weight / (self.k + rank as f32 + 1.0)
    }

    /// Fuse unweighted lists into `(id, rrf_score)` sorted descending.
    pub fn fuse(&self, ranked_lists: Vec<Vec<(String, f32)>>) -> Vec<(String, f32)> {
        let mut rrf_scores: HashMap<String, f32> = HashMap::new();

        for ranked_list in ranked_lists {
            for (rank, (id, _original_score)) in ranked_list.iter().enumerate() {
                *rrf_scores.entry(id.clone()).or_insert(0.0) += self.contribution(1.0, rank);
            }
        }

        let mut results: Vec<_> = rrf_scores.into_iter().collect();
        sort_desc(&mut results, |r| r.1, |r| r.0.as_str());
        results
    }

    /// Fuse weighted pass outputs, keeping each pass's raw score and the set
    /// of passes that contributed.
    pub fn fuse_weighted(&self, lists: &[RankedList]) -> Vec<FusedCandidate> {
        let mut fused: HashMap<String, FusedCandidate> = HashMap::new();

        for list in lists {
            for (rank, (id, raw)) in list.entries.iter().enumerate() {
                let candidate = fused.entry(id.clone()).or_insert_with(|| FusedCandidate {
                    id: id.clone(),
                    ..Default::default()
                });
                // An id repeated inside one list only counts at its best rank.
                if candidate.retrieval_method.contains(list.signal) {
                    continue;
                }
                candidate.score += self.contribution(list.weight, rank);
                candidate.record(list.signal, *raw);
            }
        }

        let mut results: Vec<FusedCandidate> = fused.into_values().collect();
        sort_desc(&mut results, |c| c.score, |c| c.id.as_str());
        results
    }

    /// Validate the k parameter.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.k.is_finite() || self.k < 0.0 {
            return Err("RRF k must be finite and non-negative");
        }
        Ok(())
    }
}

/// `exp(-factor * age_days)`, with future timestamps counted as age zero.
pub fn decay_multiplier(updated_at: DateTime<Utc>, now: DateTime<Utc>, factor: f32) -> f32 {
    if factor <= 0.0 {
        return 1.0;
    }
    let age_ms = (now - updated_at).num_milliseconds().max(0);
    let age_days = age_ms as f64 / 86_400_000.0;
    (-(factor as f64) * age_days).exp() as f32
}

/// Multiply each candidate by its decay multiplier and re-sort.
///
/// Candidates whose timestamp is unknown keep their score.
pub fn apply_temporal_decay<F>(
    candidates: &mut Vec<FusedCandidate>,
    factor: f32,
    now: DateTime<Utc>,
    updated_at: F,
) where
    F: Fn(&str) -> Option<DateTime<Utc>>,
{
    if factor <= 0.0 {
        return;
    }
    for candidate in candidates.iter_mut() {
        if let Some(ts) = updated_at(&candidate.id) {
            candidate.score *= decay_multiplier(ts, now, factor);
        }
    }
    sort_desc(candidates, |c| c.score, |c| c.id.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn list(signal: Signal, weight: f32, ids: &[&str]) -> RankedList {
        RankedList::new(
            signal,
            weight,
            ids.iter()
                .enumerate()
                .map(|(i, id)| (id.to_string(), 1.0 - i as f32 * 0.1))
                .collect(),
        )
    }

    #[test]
    fn test_rrf_single_list() {
        let rrf = RrfFusion::default();
        let results = rrf.fuse(vec![vec![
            ("a".to_string(), 1.0),
            ("b".to_string(), 0.8),
            ("c".to_string(), 0.5),
        ]]);

        assert_eq!(results[0].0, "a");
        assert!(results[0].1 > results[1].1);
        assert!(results[1].1 > results[2].1);
        assert!((results[0].1 - 1.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn test_rrf_multiple_lists() {
        let rrf = RrfFusion::default();
        let results = rrf.fuse(vec![
            vec![("a".to_string(), 1.0), ("b".to_string(), 0.5)],
            vec![("b".to_string(), 1.0), ("a".to_string(), 0.5)],
        ]);

        let a_score = results.iter().find(|(id, _)| id == "a").unwrap().1;
        let b_score = results.iter().find(|(id, _)| id == "b").unwrap().1;
        assert!((a_score - b_score).abs() < 1e-6);
    }

    #[test]
    fn test_weighted_contributions() {
        let rrf = RrfFusion::default();
        let fused = rrf.fuse_weighted(&[
            list(Signal::Lexical, 1.0, &["a", "b"]),
            list(Signal::Graph, 0.5, &["b"]),
        ]);

        let b = fused.iter().find(|c| c.id == "b").unwrap();
        let expected = 1.0 / 62.0 + 0.5 / 61.0;
        assert!((b.score - expected).abs() < 1e-6);
        assert!(b.retrieval_method.contains(Signal::Lexical));
        assert!(b.retrieval_method.contains(Signal::Graph));
        assert_eq!(b.semantic_score, None);
        assert_eq!(b.graph_score, Some(1.0));

        let a = fused.iter().find(|c| c.id == "a").unwrap();
        assert_eq!(a.retrieval_method.len(), 1);
    }

    #[test]
    fn test_rrf_monotonic_in_list_count() {
        let rrf = RrfFusion::default();
        let one = rrf.fuse_weighted(&[list(Signal::Lexical, 1.0, &["x", "a"])]);
        let two = rrf.fuse_weighted(&[
            list(Signal::Lexical, 1.0, &["x", "a"]),
            list(Signal::Semantic, 1.0, &["y", "a"]),
        ]);
        let three = rrf.fuse_weighted(&[
            list(Signal::Lexical, 1.0, &["x", "a"]),
            list(Signal::Semantic, 1.0, &["y", "a"]),
            list(Signal::Graph, 1.0, &["z", "a"]),
        ]);

        let score = |v: &[FusedCandidate]| v.iter().find(|c| c.id == "a").unwrap().score;
        assert!(score(&two) >= score(&one));
        assert!(score(&three) >= score(&two));
    }

    #[test]
    fn test_repeated_id_counts_once_per_list() {
        let rrf = RrfFusion::default();
        let fused = rrf.fuse_weighted(&[RankedList::new(
            Signal::Lexical,
            1.0,
            vec![("a".to_string(), 2.0), ("a".to_string(), 1.0)],
        )]);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-6);
        assert_eq!(fused[0].bm25_score, Some(2.0));
    }

    #[test]
    fn test_decay_multiplier() {
        let now = Utc::now();
        assert_eq!(decay_multiplier(now - Duration::days(10), now, 0.0), 1.0);
        assert_eq!(decay_multiplier(now + Duration::days(3), now, 0.5), 1.0);
        let m = decay_multiplier(now - Duration::days(2), now, 0.5);
        assert!((m - (-1.0f32).exp()).abs() < 1e-5);
    }

    #[test]
    fn test_temporal_decay_reorders() {
        let now = Utc::now();
        let mut candidates = vec![
            FusedCandidate {
                id: "old".to_string(),
                score: 0.02,
                ..Default::default()
            },
            FusedCandidate {
                id: "fresh".to_string(),
                score: 0.015,
                ..Default::default()
            },
        ];
        apply_temporal_decay(&mut candidates, 0.1, now, |id| match id {
            "old" => Some(now - Duration::days(30)),
            _ => Some(now),
        });
        assert_eq!(candidates[0].id, "fresh");
        assert!((candidates[0].score - 0.015).abs() < 1e-7);
    }
}
