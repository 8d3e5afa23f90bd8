//! [`KnowledgeRepository`](crate::traits::KnowledgeRepository) backends.
//!
//! - [`InMemoryRepository`] for tests and ephemeral engines.
//! - [`SqliteRepository`] for a single-file persistent store.

mod memory;
mod sqlite;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;
