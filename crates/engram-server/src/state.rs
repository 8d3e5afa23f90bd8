//! Server state management.

use std::time::Instant;

use engram_core::Engine;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            started_at: Instant::now(),
        }
    }
}
