//! Application state for the HTTP server.

use std::sync::Arc;

use crate::db::repository::FullRepository;
use crate::services::PipelineContext;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: PipelineContext,
}

impl AppState {
    pub fn new(pipeline: PipelineContext) -> Self {
        Self { pipeline }
    }

    pub fn repository(&self) -> &Arc<dyn FullRepository> {
        &self.pipeline.repository
    }
}
