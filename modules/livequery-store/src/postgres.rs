//! PgRecordStore: one JSONB table per logical table.
//!
//! Schema: `(key TEXT PRIMARY KEY, record JSONB, updated_at TIMESTAMPTZ)`.
//! Updates use `record || patch`, which is the same top-level merge the
//! memory backend performs.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::debug;

use crate::traits::{RecordStore, UpdateOutcome};

#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
    table: String,
}

impl PgRecordStore {
    /// `table` is interpolated into SQL, so it must be a plain identifier.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if !is_identifier(&table) {
            bail!("invalid table name: {table:?}");
        }
        Ok(Self { pool, table })
    }

    /// Create the backing table and its status index if they do not exist.
    pub async fn migrate(&self) -> Result<()> {
        let create = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                key         TEXT         PRIMARY KEY,
                record      JSONB        NOT NULL,
                updated_at  TIMESTAMPTZ  NOT NULL DEFAULT now()
            )
            "#,
            table = self.table
        );
        sqlx::query(&create).execute(&self.pool).await?;

        let index = format!(
            "CREATE INDEX IF NOT EXISTS {table}_status_idx ON {table} ((record->>'status'))",
            table = self.table
        );
        sqlx::query(&index).execute(&self.pool).await?;

        debug!(table = %self.table, "record table ready");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let sql = format!("SELECT record FROM {} WHERE key = $1", self.table);
        let row = sqlx::query_as::<_, (Json<Value>,)>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(Json(record),)| record))
    }

    async fn put(&self, key: &str, record: Value) -> Result<()> {
        let sql = format!(
            r#"
            INSERT INTO {table} (key, record) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET record = EXCLUDED.record, updated_at = now()
            "#,
            table = self.table
        );
        sqlx::query(&sql)
            .bind(key)
            .bind(Json(record))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, record: Value) -> Result<bool> {
        let sql = format!(
            "INSERT INTO {} (key, record) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(key)
            .bind(Json(record))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update(&self, key: &str, patch: Value) -> Result<UpdateOutcome> {
        if !patch.is_object() {
            bail!("update patch for {key} must be a JSON object");
        }
        let sql = format!(
            "UPDATE {} SET record = record || $2, updated_at = now() WHERE key = $1",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(key)
            .bind(Json(patch))
            .execute(&self.pool)
            .await?;
        Ok(if result.rows_affected() == 0 {
            UpdateOutcome::Missing
        } else {
            UpdateOutcome::Updated
        })
    }

    async fn update_unless(
        &self,
        key: &str,
        patch: Value,
        field: &str,
        value: &str,
    ) -> Result<UpdateOutcome> {
        if !patch.is_object() {
            bail!("update patch for {key} must be a JSON object");
        }
        let sql = format!(
            r#"
            UPDATE {} SET record = record || $2, updated_at = now()
            WHERE key = $1 AND (record->>$3) IS DISTINCT FROM $4
            "#,
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(key)
            .bind(Json(patch))
            .bind(field)
            .bind(value)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() > 0 {
            return Ok(UpdateOutcome::Updated);
        }

        let exists_sql = format!("SELECT EXISTS (SELECT 1 FROM {} WHERE key = $1)", self.table);
        let (exists,): (bool,) = sqlx::query_as(&exists_sql)
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        Ok(if exists {
            UpdateOutcome::Skipped
        } else {
            UpdateOutcome::Missing
        })
    }

    async fn scan(&self) -> Result<Vec<Value>> {
        let sql = format!("SELECT record FROM {} ORDER BY key", self.table);
        let rows = sqlx::query_as::<_, (Json<Value>,)>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(Json(record),)| record).collect())
    }

    async fn find_by(&self, field: &str, value: &str) -> Result<Vec<Value>> {
        let sql = format!(
            "SELECT record FROM {} WHERE record->>$1 = $2 ORDER BY key",
            self.table
        );
        let rows = sqlx::query_as::<_, (Json<Value>,)>(&sql)
            .bind(field)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(Json(record),)| record).collect())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
