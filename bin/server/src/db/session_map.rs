//! Postgres-backed session mapping store.

use async_trait::async_trait;
use chrono::Utc;
use parley_conversation::{KeyValueStore, StoreError};
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use tracing::debug;

/// Row type for mapping queries.
#[derive(FromRow)]
struct MappingRow {
    conversation_key: String,
    session_id: String,
}

/// Key-value store over the `session_mappings` table.
#[derive(Clone)]
pub struct PgKeyValueStore {
    pool: PgPool,
}

impl PgKeyValueStore {
    /// Creates a new store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn read_failed(e: sqlx::Error) -> StoreError {
    StoreError::ReadFailed {
        reason: e.to_string(),
    }
}

#[async_trait]
impl KeyValueStore for PgKeyValueStore {
    async fn get_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let rows: Vec<MappingRow> = sqlx::query_as(
            r#"
            SELECT conversation_key, session_id
            FROM session_mappings
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.conversation_key, row.session_id))
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row: Option<MappingRow> = sqlx::query_as(
            r#"
            SELECT conversation_key, session_id
            FROM session_mappings
            WHERE conversation_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_failed)?;

        Ok(row.map(|row| row.session_id))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO session_mappings (conversation_key, session_id, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (conversation_key)
            DO UPDATE SET session_id = $2, updated_at = $3
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::WriteFailed {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        debug!(key = %key, "Upserted session mapping");
        Ok(())
    }
}
