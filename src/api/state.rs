//! Application state for the API server

use crate::{Config, QueueManager};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
#[derive(Clone)]
pub struct AppState {
    /// The queue manager serving every request
    pub manager: Arc<QueueManager>,

    /// Configuration the router was built from
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(manager: Arc<QueueManager>, config: Arc<Config>) -> Self {
        Self { manager, config }
    }
}
