//! Read-through handler for document collections.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, warn};

use crate::cache::cache_key;
use crate::errors::AppError;
use crate::state::AppState;
use crate::store::SortPolicy;

const MAX_COLLECTION_NAME: usize = 64;

/// GET /:collection
///
/// Serves the cached document list when fresh; otherwise queries the store,
/// caches the result, and serves that. Cache state alone never causes an error.
/// If the store fails and an expired entry is still held (the refresher keeps
/// entries of targets it could not refresh), that entry is served instead.
pub async fn handle_get_collection(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<Response, AppError> {
    validate_collection_name(&collection)?;

    let key = cache_key(&collection);
    if let Some(docs) = state.cache.get(&key) {
        info!(key = %key, "Returning cached data");
        return Ok(Json(docs.as_slice()).into_response());
    }

    let docs = match state
        .store
        .query(&collection, &SortPolicy::for_collection(&collection))
        .await
    {
        Ok(docs) => Arc::new(docs),
        Err(e) => match state.cache.get_stale(&key) {
            Some(stale) => {
                warn!(key = %key, error = %e, "Store query failed; returning stale data");
                return Ok(Json(stale.as_slice()).into_response());
            }
            None => return Err(e.into()),
        },
    };

    info!(key = %key, count = docs.len(), "Caching new data");
    state.cache.set(&key, docs.clone());

    Ok(Json(docs.as_slice()).into_response())
}

fn validate_collection_name(name: &str) -> Result<(), AppError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_COLLECTION_NAME
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "invalid collection name '{name}'"
        )))
    }
}
