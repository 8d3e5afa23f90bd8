//! BM25 scoring against a [`TermIndex`].
//!
//! Contribution of a query term present in a document:
//!
//! ```text
//! idf * (tf * (k1 + 1)) / (tf + k1 * (1 - b + b * docLen / avgDocLen))
//! idf = ln((N - df + 0.5) / (df + 0.5))
//! ```
//!
//! A non-positive idf clamps the contribution to zero. Documents that share
//! no term with the query are absent from the output; documents whose every
//! matching term clamps are present with score zero.

use std::collections::{BTreeMap, HashMap};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::index::TermIndex;
use crate::text::levenshtein;

/// BM25 parameters, including the optional fuzzy expansion pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    /// Term-frequency saturation. Default: 1.2
    pub k1: f32,
    /// Length normalization. Default: 0.75
    pub b: f32,
    /// Maximum edit distance for fuzzy expansion; 0 disables it.
    pub fuzzy_max_edits: usize,
    /// Query terms shorter than this are never expanded. Default: 5
    pub fuzzy_min_term_len: usize,
    /// Multiplier applied to contributions of expanded terms. Default: 0.5
    pub fuzzy_penalty: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            fuzzy_max_edits: 0,
            fuzzy_min_term_len: 5,
            fuzzy_penalty: 0.5,
        }
    }
}

impl Bm25Params {
    /// Enable fuzzy expansion up to `max_edits`.
    pub fn with_fuzzy(mut self, max_edits: usize) -> Self {
        self.fuzzy_max_edits = max_edits;
        self
    }

    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err("k1 must be finite and non-negative");
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err("b must be between 0.0 and 1.0");
        }
        if !(0.0..=1.0).contains(&self.fuzzy_penalty) {
            return Err("fuzzy_penalty must be between 0.0 and 1.0");
        }
        Ok(())
    }
}

/// How one query term contributed to one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermContribution {
    /// The query term.
    pub query_term: String,
    /// Vocabulary term that matched (differs from `query_term` when fuzzy).
    pub matched_term: String,
    pub tf: u32,
    pub idf: f32,
    pub contribution: f32,
}

/// Score and breakdown for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bm25Score {
    pub score: f32,
    pub breakdown: Vec<TermContribution>,
}

/// Inverse document frequency; may be negative.
pub fn idf(doc_count: usize, df: usize) -> f32 {
    let n = doc_count as f32;
    let df = df as f32;
    ((n - df + 0.5) / (df + 0.5)).ln()
}

/// A vocabulary term to look up, with the query term it came from.
struct Lookup<'a> {
    query_term: &'a str,
    matched_term: String,
    weight: f32,
}

fn expand_terms<'a>(
    index: &TermIndex,
    query_terms: &'a [String],
    params: &Bm25Params,
) -> Vec<Lookup<'a>> {
    // matched term -> best lookup; an exact match always wins over a fuzzy one
    let mut lookups: BTreeMap<String, Lookup<'a>> = BTreeMap::new();

    for term in query_terms {
        if lookups.get(term).is_some_and(|l| l.weight >= 1.0) {
            continue;
        }
        if index.contains_term(term) {
            lookups.insert(
                term.clone(),
                Lookup {
                    query_term: term,
                    matched_term: term.clone(),
                    weight: 1.0,
                },
            );
            continue;
        }
        if params.fuzzy_max_edits == 0 || term.chars().count() < params.fuzzy_min_term_len {
            continue;
        }
        for candidate in index.vocabulary() {
            if lookups.contains_key(candidate) {
                continue;
            }
            let distance = levenshtein(term, candidate);
            if distance > 0 && distance <= params.fuzzy_max_edits {
                lookups.insert(
                    candidate.to_string(),
                    Lookup {
                        query_term: term,
                        matched_term: candidate.to_string(),
                        weight: params.fuzzy_penalty,
                    },
                );
            }
        }
    }

    lookups.into_values().collect()
}

/// Score every document that shares at least one (possibly expanded) term
/// with `query_terms`.
pub fn score(
    index: &TermIndex,
    query_terms: &[String],
    params: &Bm25Params,
) -> HashMap<String, Bm25Score> {
    let mut scores: HashMap<String, Bm25Score> = HashMap::new();
    let n = index.doc_count();
    if n == 0 {
        return scores;
    }
    let avg_len = if index.avg_doc_len() > 0.0 {
        index.avg_doc_len()
    } else {
        1.0
    };

    for lookup in expand_terms(index, query_terms, params) {
        let Some(postings) = index.postings(&lookup.matched_term) else {
            continue;
        };
        let term_idf = idf(n, postings.len());

        for (doc_id, &tf) in postings {
            let contribution = if term_idf <= 0.0 {
                0.0
            } else {
                let doc_len = index.doc_len(doc_id).unwrap_or(0) as f32;
                let tf_f = tf as f32;
                let norm = params.k1 * (1.0 - params.b + params.b * (doc_len / avg_len));
                term_idf * (tf_f * (params.k1 + 1.0)) / (tf_f + norm) * lookup.weight
            };

            let entry = scores.entry(doc_id.clone()).or_default();
            entry.score += contribution;
            entry.breakdown.push(TermContribution {
                query_term: lookup.query_term.to_string(),
                matched_term: lookup.matched_term.clone(),
                tf,
                idf: term_idf,
                contribution,
            });
        }
    }

    scores
}

/// Scores as a list sorted by score descending, ties broken by id.
pub fn rank(scores: &HashMap<String, Bm25Score>) -> Vec<(String, f32)> {
    let mut ranked: Vec<(String, f32)> = scores
        .iter()
        .map(|(id, s)| (id.clone(), s.score))
        .collect();
    ranked.sort_by(|a, b| {
        OrderedFloat(b.1)
            .cmp(&OrderedFloat(a.1))
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked
}
