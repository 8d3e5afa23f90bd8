//! Maximal Marginal Relevance re-selection.
//!
//! Greedily picks the candidate maximizing
//! `λ * relevance - (1 - λ) * max_jaccard_to_selected`, where relevance is
//! the fused score divided by the top fused score.

use std::collections::HashSet;

use crate::text::jaccard_similarity;

/// A candidate for MMR: id, fused score and term set.
#[derive(Debug, Clone)]
pub struct MmrCandidate {
    pub id: String,
    pub score: f32,
    pub terms: HashSet<String>,
}

impl MmrCandidate {
    pub fn new(id: impl Into<String>, score: f32, terms: HashSet<String>) -> Self {
        Self {
            id: id.into(),
            score,
            terms,
        }
    }
}

/// Select up to `max_results` candidates. Input order breaks ties, so pass
/// candidates sorted by fused score. Returns indices into `candidates` in
/// selection order; no index appears twice.
pub fn mmr_select(candidates: &[MmrCandidate], lambda: f32, max_results: usize) -> Vec<usize> {
    let top = candidates
        .iter()
        .map(|c| c.score)
        .fold(f32::NEG_INFINITY, f32::max);
    let norm = if top > 0.0 { top } else { 1.0 };

    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    let mut selected: Vec<usize> = Vec::with_capacity(max_results.min(candidates.len()));

    while selected.len() < max_results && !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_value = f32::NEG_INFINITY;

        for (pos, &idx) in remaining.iter().enumerate() {
            let candidate = &candidates[idx];
            let relevance = candidate.score / norm;
            let redundancy = selected
                .iter()
                .map(|&s| jaccard_similarity(&candidate.terms, &candidates[s].terms))
                .fold(0.0f32, f32::max);
            let value = lambda * relevance - (1.0 - lambda) * redundancy;
            if value > best_value {
                best_value = value;
                best_pos = pos;
            }
        }

        selected.push(remaining.remove(best_pos));
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::token_set;

    fn candidate(id: &str, score: f32, text: &str) -> MmrCandidate {
        MmrCandidate::new(id, score, token_set(text))
    }

    #[test]
    fn test_never_exceeds_max_or_repeats() {
        let candidates: Vec<MmrCandidate> = (0..10)
            .map(|i| candidate(&format!("c{i}"), 1.0 - i as f32 * 0.05, "shared words here"))
            .collect();
        for max in [0, 1, 3, 10, 20] {
            let picked = mmr_select(&candidates, 0.7, max);
            assert!(picked.len() <= max);
            let unique: HashSet<usize> = picked.iter().copied().collect();
            assert_eq!(unique.len(), picked.len());
        }
    }

    #[test]
    fn test_first_pick_is_most_relevant() {
        let candidates = vec![
            candidate("a", 0.9, "rust ownership borrow"),
            candidate("b", 0.5, "python typing"),
        ];
        assert_eq!(mmr_select(&candidates, 0.7, 1), vec![0]);
    }

    #[test]
    fn test_diversity_promotes_different_content() {
        let candidates = vec![
            candidate("a", 1.0, "rust ownership borrow checker"),
            candidate("b", 0.95, "rust ownership borrow checker rules"),
            candidate("c", 0.9, "gardening tomatoes summer"),
        ];
        let picked = mmr_select(&candidates, 0.5, 2);
        assert_eq!(picked, vec![0, 2]);

        // Pure relevance keeps fused order.
        assert_eq!(mmr_select(&candidates, 1.0, 3), vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_input() {
        assert!(mmr_select(&[], 0.7, 5).is_empty());
    }
}
