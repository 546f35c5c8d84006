//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use hearth_chat::Orchestrator;
use hearth_core::config::HearthConfig;
use hearth_storage::ListingRepository;
use hearth_vector::InMemoryVectorIndex;

/// Shared application state. Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<HearthConfig>,
    pub orchestrator: Arc<Orchestrator>,
    pub repo: Arc<dyn ListingRepository>,
    /// Kept for diagnostics; the orchestrator searches through its own handle.
    pub vector_index: InMemoryVectorIndex,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: HearthConfig,
        orchestrator: Arc<Orchestrator>,
        repo: Arc<dyn ListingRepository>,
        vector_index: InMemoryVectorIndex,
    ) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            repo,
            vector_index,
            start_time: Instant::now(),
        }
    }
}
