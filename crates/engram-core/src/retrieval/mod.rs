//! Fusion and reranking.
//!
//! Weighted reciprocal rank fusion over the lexical, semantic and graph
//! passes, optional temporal decay, then MMR re-selection for diversity.

mod fusion;
mod mmr;

pub use fusion::{
    apply_temporal_decay, decay_multiplier, FusedCandidate, RankedList, RrfFusion,
};
pub use mmr::{mmr_select, MmrCandidate};
