//! Inverted term index with per-document statistics.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::text::tokenize;
use crate::types::Item;

/// Postings for a single term: document id to term frequency.
pub type Postings = HashMap<String, u32>;

/// Immutable inverted index over one corpus snapshot.
///
/// Built in one pass and never mutated afterwards; a changed corpus produces
/// a new index.
#[derive(Debug, Clone)]
pub struct TermIndex {
    postings: HashMap<String, Postings>,
    doc_lengths: HashMap<String, usize>,
    avg_doc_len: f32,
    built_at: DateTime<Utc>,
}

impl TermIndex {
    /// Build an index over the searchable text of `items`.
    ///
    /// Later duplicates of an id replace earlier ones.
    pub fn build<'a>(items: impl IntoIterator<Item = &'a Item>) -> Self {
        Self::from_documents(
            items
                .into_iter()
                .map(|item| (item.id.clone(), item.searchable_text())),
        )
    }

    /// Build an index from raw `(id, text)` pairs.
    pub fn from_documents(docs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut latest: HashMap<String, String> = HashMap::new();
        for (id, text) in docs {
            latest.insert(id, text);
        }

        let mut postings: HashMap<String, Postings> = HashMap::new();
        let mut doc_lengths = HashMap::with_capacity(latest.len());
        let mut total_len = 0usize;

        for (id, text) in latest {
            let tokens = tokenize(&text);
            total_len += tokens.len();
            doc_lengths.insert(id.clone(), tokens.len());
            for token in tokens {
                *postings
                    .entry(token)
                    .or_default()
                    .entry(id.clone())
                    .or_insert(0) += 1;
            }
        }

        let avg_doc_len = if doc_lengths.is_empty() {
            0.0
        } else {
            total_len as f32 / doc_lengths.len() as f32
        };

        Self {
            postings,
            doc_lengths,
            avg_doc_len,
            built_at: Utc::now(),
        }
    }

    /// Number of indexed documents (N).
    pub fn doc_count(&self) -> usize {
        self.doc_lengths.len()
    }

    /// Mean document length in terms.
    pub fn avg_doc_len(&self) -> f32 {
        self.avg_doc_len
    }

    /// Length in terms of one document.
    pub fn doc_len(&self, id: &str) -> Option<usize> {
        self.doc_lengths.get(id).copied()
    }

    /// Whether the document was part of the corpus.
    pub fn contains_doc(&self, id: &str) -> bool {
        self.doc_lengths.contains_key(id)
    }

    /// Postings for a term.
    pub fn postings(&self, term: &str) -> Option<&Postings> {
        self.postings.get(term)
    }

    /// Number of documents containing `term`.
    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, HashMap::len)
    }

    /// Whether the vocabulary contains `term`.
    pub fn contains_term(&self, term: &str) -> bool {
        self.postings.contains_key(term)
    }

    /// All distinct terms.
    pub fn vocabulary(&self) -> impl Iterator<Item = &str> {
        self.postings.keys().map(String::as_str)
    }

    /// Number of distinct terms.
    pub fn vocabulary_size(&self) -> usize {
        self.postings.len()
    }

    /// When this index was built.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Fraction of the distinct query terms each document contains.
    ///
    /// Documents with no query term are absent. Sorted by coverage
    /// descending, ties by id.
    pub fn coverage(&self, query_terms: &[String]) -> Vec<(String, f32)> {
        let distinct: HashSet<&str> = query_terms.iter().map(String::as_str).collect();
        if distinct.is_empty() {
            return Vec::new();
        }

        let mut hits: HashMap<&str, usize> = HashMap::new();
        for term in &distinct {
            if let Some(postings) = self.postings.get(*term) {
                for id in postings.keys() {
                    *hits.entry(id.as_str()).or_insert(0) += 1;
                }
            }
        }

        let total = distinct.len() as f32;
        let mut ranked: Vec<(String, f32)> = hits
            .into_iter()
            .map(|(id, n)| (id.to_string(), n as f32 / total))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> TermIndex {
        TermIndex::from_documents(vec![
            ("a".to_string(), "cats are great pets".to_string()),
            ("b".to_string(), "dogs are loyal pets, loyal friends".to_string()),
            ("c".to_string(), "the stock market rose today".to_string()),
        ])
    }

    #[test]
    fn test_statistics() {
        let index = corpus();
        assert_eq!(index.doc_count(), 3);
        assert_eq!(index.doc_len("a"), Some(3));
        assert_eq!(index.doc_len("b"), Some(5));
        assert_eq!(index.doc_len("c"), Some(4));
        assert!((index.avg_doc_len() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_postings_track_frequency() {
        let index = corpus();
        assert_eq!(index.document_frequency("pets"), 2);
        assert_eq!(index.postings("loyal").and_then(|p| p.get("b")), Some(&2));
        assert!(!index.contains_term("are"));
        assert_eq!(index.document_frequency("unknown"), 0);
    }

    #[test]
    fn test_duplicate_ids_keep_latest() {
        let index = TermIndex::from_documents(vec![
            ("a".to_string(), "first version".to_string()),
            ("a".to_string(), "second draft".to_string()),
        ]);
        assert_eq!(index.doc_count(), 1);
        assert!(!index.contains_term("first"));
        assert!(index.contains_term("draft"));
    }

    #[test]
    fn test_build_uses_title() {
        let items = vec![Item::new("x", "body words").with_title("Heading")];
        let index = TermIndex::build(&items);
        assert!(index.contains_term("heading"));
        assert!(index.contains_term("body"));
    }

    #[test]
    fn test_coverage() {
        let index = corpus();
        let terms = vec!["loyal".to_string(), "pets".to_string(), "pets".to_string()];
        let coverage = index.coverage(&terms);
        assert_eq!(coverage[0], ("b".to_string(), 1.0));
        assert_eq!(coverage[1], ("a".to_string(), 0.5));
        assert_eq!(coverage.len(), 2);
        assert!(index.coverage(&[]).is_empty());
    }

    #[test]
    fn test_empty_corpus() {
        let index = TermIndex::from_documents(Vec::new());
        assert_eq!(index.doc_count(), 0);
        assert_eq!(index.avg_doc_len(), 0.0);
    }
}
