//! Application State

use std::sync::Arc;

use query_core::QueryPipeline;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Orchestrator with its model routes and capability registry
    pub pipeline: Arc<QueryPipeline>,
}

impl AppState {
    pub fn new(pipeline: QueryPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}
