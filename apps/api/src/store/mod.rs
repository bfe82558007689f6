//! Document store client.
//!
//! The store is a thin pass-through: it returns every record of a collection,
//! fully materialized and ordered by the collection's sort policy. Both the
//! request path (cache miss) and the refresh scheduler go through
//! [`DocumentStore`] so tests can swap in an in-memory implementation.

pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use postgres::PgDocumentStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Which document field a collection is ordered by, and in which direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortPolicy {
    pub field: &'static str,
    pub order: SortOrder,
}

impl SortPolicy {
    /// `posts` are newest-first by `date`; everything else is chronological by `dateStart`.
    pub fn for_collection(collection: &str) -> Self {
        if collection == "posts" {
            SortPolicy {
                field: "date",
                order: SortOrder::Descending,
            }
        } else {
            SortPolicy {
                field: "dateStart",
                order: SortOrder::Ascending,
            }
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns every document in `collection`, ordered per `sort`.
    /// Each document carries its identifier as a string `_id` field.
    async fn query(&self, collection: &str, sort: &SortPolicy) -> Result<Vec<Value>, StoreError>;
}
