//! Background refresh of the collection cache.
//!
//! Every cycle re-queries each [`RefreshTarget`] in order, stores the result,
//! then sweeps expired entries. A failed query keeps the previous entry,
//! which the sweep leaves alone, and moves on to the next target. Readers
//! may see a partially refreshed cache while a cycle is in flight.
//!
//! # Shutdown
//! The loop only observes the shutdown signal while sleeping between cycles;
//! a cycle that has started always runs to completion.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use crate::cache::{cache_key, CollectionCache};
use crate::store::{DocumentStore, SortPolicy};

/// One collection the scheduler keeps warm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTarget {
    pub collection: String,
    pub cache_key: String,
    pub sort: SortPolicy,
}

impl RefreshTarget {
    pub fn for_collection(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            cache_key: cache_key(collection),
            sort: SortPolicy::for_collection(collection),
        }
    }

    /// Builds targets in the given order, dropping any whose cache key repeats.
    pub fn from_collections<S: AsRef<str>>(collections: &[S]) -> Vec<Self> {
        let mut seen = HashSet::new();
        collections
            .iter()
            .map(|c| Self::for_collection(c.as_ref()))
            .filter(|t| seen.insert(t.cache_key.clone()))
            .collect()
    }
}

/// Counters accumulated over the scheduler's lifetime.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
    pub cycles: AtomicU64,
    pub target_failures: AtomicU64,
    pub entries_evicted: AtomicU64,
}

/// Outcome of a single refresh cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub refreshed: Vec<String>,
    pub failed: Vec<String>,
    pub evicted: usize,
}

/// Runs one full refresh cycle: every target in order, then an expiry sweep.
pub async fn refresh_cycle(
    cache: &CollectionCache,
    store: &dyn DocumentStore,
    targets: &[RefreshTarget],
    metrics: &RefreshMetrics,
) -> RefreshReport {
    info!(targets = targets.len(), "Starting cache refresh");
    let mut report = RefreshReport::default();

    for target in targets {
        match store.query(&target.collection, &target.sort).await {
            Ok(docs) => {
                cache.set(&target.cache_key, Arc::new(docs));
                report.refreshed.push(target.cache_key.clone());
            }
            Err(e) => {
                error!(
                    collection = %target.collection,
                    error = %e,
                    "Cache refresh failed; keeping previous entry"
                );
                metrics.target_failures.fetch_add(1, Ordering::Relaxed);
                report.failed.push(target.cache_key.clone());
            }
        }
    }

    // Entries for failed targets are stale by now but must outlive the sweep.
    report.evicted = cache.evict_expired_except(&report.failed);
    metrics
        .entries_evicted
        .fetch_add(report.evicted as u64, Ordering::Relaxed);
    metrics.cycles.fetch_add(1, Ordering::Relaxed);

    info!(
        refreshed = report.refreshed.len(),
        failed = report.failed.len(),
        evicted = report.evicted,
        "Cache refresh completed"
    );
    report
}

/// Refreshes `targets` immediately, then once every `period`, until `shutdown` flips to true.
pub async fn run_refresh_loop(
    cache: Arc<CollectionCache>,
    store: Arc<dyn DocumentStore>,
    targets: Vec<RefreshTarget>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Arc<RefreshMetrics> {
    let metrics = Arc::new(RefreshMetrics::default());

    info!(
        period_secs = period.as_secs(),
        targets = ?targets.iter().map(|t| t.collection.as_str()).collect::<Vec<_>>(),
        "Cache refresh task started"
    );

    loop {
        refresh_cycle(&cache, store.as_ref(), &targets, &metrics).await;

        tokio::select! {
            changed = shutdown.changed() => {
                // A dropped sender counts as shutdown too.
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(period) => {}
        }
    }

    info!(
        cycles = metrics.cycles.load(Ordering::Relaxed),
        target_failures = metrics.target_failures.load(Ordering::Relaxed),
        "Cache refresh task shutting down"
    );
    metrics
}
