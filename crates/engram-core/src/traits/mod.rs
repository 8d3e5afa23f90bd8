//! Traits at the engine's external seams.

mod embedder;
mod repository;
mod vector_index;

pub use embedder::*;
pub use repository::*;
pub use vector_index::*;
