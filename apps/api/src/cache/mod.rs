// Collection cache: TTL store plus the background task that keeps it warm.
// Both the request path and the refresh loop share one Arc<CollectionCache>.

pub mod refresh;
pub mod ttl;

use std::sync::Arc;

use serde_json::Value;

pub use refresh::{run_refresh_loop, RefreshTarget};
pub use ttl::TtlCache;

/// Cached payload for one collection: the full ordered document list.
pub type CollectionDocs = Arc<Vec<Value>>;

pub type CollectionCache = TtlCache<CollectionDocs>;

/// Cache key under which a collection's documents are stored.
pub fn cache_key(collection: &str) -> String {
    format!("{collection}_cache")
}
