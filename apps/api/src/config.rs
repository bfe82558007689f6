use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub port: u16,
    pub rust_log: String,
    pub cache_ttl: Duration,
    /// Collections repopulated by the refresh scheduler, in refresh order.
    pub refresh_collections: Vec<String>,
    pub latex_compiler: PathBuf,
    pub compile_timeout: Duration,
    pub compile_work_dir: PathBuf,
    /// Where finished PDFs wait for the response layer; defaults to the work dir.
    pub compile_artifact_dir: Option<PathBuf>,
}

/// Document store connection components.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub user: String,
    pub password: String,
    /// `host` or `host:port`.
    pub host: String,
    pub database: String,
    pub tls_ca_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            store: StoreConfig {
                user: require_env("DB_USER")?,
                password: require_env("PASSWORD")?,
                host: require_env("HOST")?,
                database: require_env("DB_CLIENT")?,
                tls_ca_file: std::env::var("TLS_CA_FILE").ok().map(PathBuf::from),
            },
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            cache_ttl: Duration::from_secs(parse_secs("CACHE_TTL_SECS", 30 * 60)?),
            refresh_collections: parse_list(
                &std::env::var("REFRESH_COLLECTIONS").unwrap_or_else(|_| "posts,events".into()),
            ),
            latex_compiler: std::env::var("LATEX_COMPILER")
                .unwrap_or_else(|_| "pdflatex".to_string())
                .into(),
            compile_timeout: Duration::from_secs(parse_secs("COMPILE_TIMEOUT_SECS", 60)?),
            compile_work_dir: std::env::var("COMPILE_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            compile_artifact_dir: std::env::var("COMPILE_ARTIFACT_DIR").ok().map(PathBuf::from),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_secs(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("{key} must be a whole number of seconds")),
        Err(_) => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_trims_and_skips_blanks() {
        assert_eq!(parse_list(" posts, events ,,"), vec!["posts", "events"]);
    }

    #[test]
    fn test_parse_list_empty() {
        assert!(parse_list("").is_empty());
    }
}
