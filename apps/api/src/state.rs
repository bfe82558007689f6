use std::sync::Arc;

use crate::cache::CollectionCache;
use crate::render::CompilationPipeline;
use crate::store::DocumentStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Same instance the refresh task writes to.
    pub cache: Arc<CollectionCache>,
    pub store: Arc<dyn DocumentStore>,
    pub pipeline: Arc<CompilationPipeline>,
}
