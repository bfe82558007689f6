pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::collections::handlers::handle_get_collection;
use crate::render::handlers::handle_generate_pdf;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/generate_pdf", post(handle_generate_pdf))
        .route("/:collection", get(handle_get_collection))
        .with_state(state)
}
