use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{DocumentStore, SortPolicy, StoreError};

/// Postgres-backed document store. Documents are JSONB bodies in a single
/// `documents` table partitioned by the `collection` column.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn query(&self, collection: &str, sort: &SortPolicy) -> Result<Vec<Value>, StoreError> {
        // Direction is a fixed keyword from SortOrder, never caller input.
        let sql = format!(
            "SELECT id, body FROM documents WHERE collection = $1 ORDER BY body ->> $2 {}, id",
            sort.order.as_sql()
        );

        let rows: Vec<(Uuid, Json<Value>)> = sqlx::query_as(&sql)
            .bind(collection)
            .bind(sort.field)
            .fetch_all(&self.pool)
            .await?;

        debug!(collection, rows = rows.len(), "Queried document store");

        Ok(rows
            .into_iter()
            .map(|(id, Json(body))| with_string_id(id, body))
            .collect())
    }
}

/// Exposes the row id as a string `_id` field on object documents.
fn with_string_id(id: Uuid, mut body: Value) -> Value {
    if let Value::Object(map) = &mut body {
        map.insert("_id".to_string(), Value::String(id.to_string()));
    }
    body
}
