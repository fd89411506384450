//! Application state for the API server

use crate::{Config, GeoCatalog, RunOrchestrator};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// Orchestrator that owns every run
    pub orchestrator: Arc<RunOrchestrator>,

    /// Configuration used for request defaults
    pub config: Arc<Config>,

    /// Region, city and ISP lookups
    pub catalog: Arc<GeoCatalog>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(orchestrator: Arc<RunOrchestrator>, config: Arc<Config>) -> Self {
        let catalog = Arc::new(GeoCatalog::from_config(&config));
        Self {
            orchestrator,
            config,
            catalog,
        }
    }
}
