//! Term index and BM25 scorer.
//!
//! [`LexicalIndex`] holds the currently published [`TermIndex`]. Rebuilds
//! happen off to the side and are swapped in as a new `Arc`, so a search
//! always scores against one consistent snapshot.

mod bm25;
mod index;

pub use bm25::{idf, rank, score, Bm25Params, Bm25Score, TermContribution};
pub use index::{Postings, TermIndex};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::{EngramError, EngramResult};
use crate::text::tokenize;
use crate::types::Item;

/// Shared handle to the published term index.
#[derive(Debug, Default)]
pub struct LexicalIndex {
    current: RwLock<Option<Arc<TermIndex>>>,
    dirty: AtomicBool,
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh index from `items` and publish it.
    pub fn rebuild(&self, items: &[Item]) -> EngramResult<Arc<TermIndex>> {
        // Clear first so writes racing with the build re-mark the index.
        self.dirty.store(false, Ordering::SeqCst);
        let built = Arc::new(TermIndex::build(items));
        debug!(
            docs = built.doc_count(),
            terms = built.vocabulary_size(),
            "Term index rebuilt"
        );

        let mut guard = self
            .current
            .write()
            .map_err(|e| EngramError::internal(format!("term index lock poisoned: {}", e)))?;
        *guard = Some(Arc::clone(&built));
        Ok(built)
    }

    /// The published index, if any build has succeeded.
    pub fn snapshot(&self) -> EngramResult<Option<Arc<TermIndex>>> {
        let guard = self
            .current
            .read()
            .map_err(|e| EngramError::internal(format!("term index lock poisoned: {}", e)))?;
        Ok(guard.clone())
    }

    /// Flag the corpus as changed since the last build.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Whether the corpus changed since the last build.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Run the lexical pass: `(id, score)` sorted descending.
    ///
    /// Returns `IndexStale` when no index has been published yet.
    pub fn search(&self, query: &str, params: &Bm25Params) -> EngramResult<Vec<(String, f32)>> {
        let index = self
            .snapshot()?
            .ok_or_else(|| EngramError::index_stale("term index has not been built"))?;
        let terms = tokenize(query);
        Ok(rank(&score(&index, &terms, params)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_before_build_is_stale() {
        let index = LexicalIndex::new();
        let err = index.search("anything", &Bm25Params::default()).unwrap_err();
        assert!(matches!(err, EngramError::IndexStale { .. }));
    }

    #[test]
    fn test_rebuild_swaps_snapshot() {
        let index = LexicalIndex::new();
        index
            .rebuild(&[Item::new("a", "first corpus")])
            .unwrap();
        let old = index.snapshot().unwrap().unwrap();

        index.mark_dirty();
        assert!(index.is_dirty());
        index
            .rebuild(&[Item::new("a", "first corpus"), Item::new("b", "second corpus")])
            .unwrap();
        assert!(!index.is_dirty());

        // Readers holding the old snapshot are unaffected.
        assert_eq!(old.doc_count(), 1);
        assert_eq!(index.snapshot().unwrap().unwrap().doc_count(), 2);
    }

    #[test]
    fn test_search_scenario() {
        let index = LexicalIndex::new();
        index
            .rebuild(&[
                Item::new("1", "cats are great pets"),
                Item::new("2", "dogs are loyal pets"),
                Item::new("3", "the stock market rose today"),
            ])
            .unwrap();

        let ranked = index.search("pets", &Bm25Params::default()).unwrap();
        let ids: Vec<&str> = ranked.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"1") && ids.contains(&"2"));
        assert!(!ids.contains(&"3"));
    }
}
