use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use tracing::info;

use crate::config::StoreConfig;

/// Creates and returns a PostgreSQL connection pool for the document store.
pub async fn create_pool(store: &StoreConfig) -> Result<PgPool> {
    info!(host = %store.host, database = %store.database, "Connecting to document store...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect_with(connect_options(store)?)
        .await?;

    info!("Document store connection pool established");
    Ok(pool)
}

fn connect_options(store: &StoreConfig) -> Result<PgConnectOptions> {
    let (host, port) = split_host(&store.host)?;

    let mut options = PgConnectOptions::new()
        .host(host)
        .username(&store.user)
        .password(&store.password)
        .database(&store.database);

    if let Some(port) = port {
        options = options.port(port);
    }

    if let Some(ca) = &store.tls_ca_file {
        options = options.ssl_mode(PgSslMode::VerifyFull).ssl_root_cert(ca);
    }

    Ok(options)
}

fn split_host(raw: &str) -> Result<(&str, Option<u16>)> {
    match raw.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .with_context(|| format!("HOST '{raw}' has an invalid port"))?;
            Ok((host, Some(port)))
        }
        None => Ok((raw, None)),
    }
}
