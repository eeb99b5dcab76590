use std::sync::Arc;

use crate::engine::FreshnessEngine;
use crate::topics::TopicStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<FreshnessEngine>,
    /// Same store the engine reads; handlers use it for topic listings.
    pub topics: Arc<dyn TopicStore>,
}
