mod cache;
mod collections;
mod config;
mod db;
mod errors;
mod models;
mod render;
mod routes;
mod state;
mod store;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::{run_refresh_loop, CollectionCache, RefreshTarget};
use crate::config::Config;
use crate::db::create_pool;
use crate::render::CompilationPipeline;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{DocumentStore, PgDocumentStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Vitae API v{}", env!("CARGO_PKG_VERSION"));

    // Document store
    let pool = create_pool(&config.store).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(pool));

    // Collection cache + background refresh
    let cache = Arc::new(CollectionCache::new(config.cache_ttl));
    let targets = RefreshTarget::from_collections(&config.refresh_collections);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresher = tokio::spawn(run_refresh_loop(
        cache.clone(),
        store.clone(),
        targets,
        config.cache_ttl,
        shutdown_rx,
    ));

    // LaTeX compilation
    tokio::fs::create_dir_all(&config.compile_work_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create compile work dir {}",
                config.compile_work_dir.display()
            )
        })?;
    let mut pipeline = CompilationPipeline::new(
        config.latex_compiler.clone(),
        config.compile_work_dir.clone(),
        config.compile_timeout,
    );
    if let Some(dir) = &config.compile_artifact_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create artifact dir {}", dir.display()))?;
        pipeline = pipeline.with_artifact_dir(dir);
    }
    info!(
        compiler = %config.latex_compiler.display(),
        timeout_secs = config.compile_timeout.as_secs(),
        "Compilation pipeline initialized"
    );

    let state = AppState {
        cache,
        store,
        pipeline: Arc::new(pipeline),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Server has drained; stop the refresh task between cycles.
    let _ = shutdown_tx.send(true);
    match refresher.await {
        Ok(_) => info!("Cache refresh task stopped"),
        Err(e) => tracing::warn!("Cache refresh task ended abnormally: {e}"),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
