//! Core traits for the record store.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Result of a conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// No record exists under the key; nothing was written.
    Missing,
    /// The record matched the guard of `update_unless`; nothing was written.
    Skipped,
}

/// Durable key-value store of JSON records.
///
/// Implemented by PgRecordStore (postgres) and MemoryRecordStore (tests).
/// Also implemented for `Arc<S>` so a store can be shared for assertions.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Overwrite (or create) the record under `key`.
    async fn put(&self, key: &str, record: Value) -> Result<()>;

    /// Create the record only if `key` is free. Returns false if it was taken.
    async fn put_if_absent(&self, key: &str, record: Value) -> Result<bool>;

    /// Merge the top-level fields of `patch` (a JSON object) into an existing
    /// record. Never creates a record.
    async fn update(&self, key: &str, patch: Value) -> Result<UpdateOutcome>;

    /// `update`, except a record whose top-level string `field` equals
    /// `value` is left as is. The check and the write are one step.
    async fn update_unless(
        &self,
        key: &str,
        patch: Value,
        field: &str,
        value: &str,
    ) -> Result<UpdateOutcome>;

    /// Every record in the table, ordered by key.
    async fn scan(&self) -> Result<Vec<Value>>;

    /// Records whose top-level string `field` equals `value`, ordered by key.
    async fn find_by(&self, field: &str, value: &str) -> Result<Vec<Value>>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, record: Value) -> Result<()> {
        (**self).put(key, record).await
    }

    async fn put_if_absent(&self, key: &str, record: Value) -> Result<bool> {
        (**self).put_if_absent(key, record).await
    }

    async fn update(&self, key: &str, patch: Value) -> Result<UpdateOutcome> {
        (**self).update(key, patch).await
    }

    async fn update_unless(
        &self,
        key: &str,
        patch: Value,
        field: &str,
        value: &str,
    ) -> Result<UpdateOutcome> {
        (**self).update_unless(key, patch, field, value).await
    }

    async fn scan(&self) -> Result<Vec<Value>> {
        (**self).scan().await
    }

    async fn find_by(&self, field: &str, value: &str) -> Result<Vec<Value>> {
        (**self).find_by(field, value).await
    }
}

/// Typed helpers over any `RecordStore`.
#[async_trait]
pub trait RecordStoreExt: RecordStore {
    async fn get_as<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(value) => Ok(Some(
                serde_json::from_value(value)
                    .with_context(|| format!("record {key} has an unexpected shape"))?,
            )),
            None => Ok(None),
        }
    }

    async fn put_as<T: Serialize + Sync>(&self, key: &str, record: &T) -> Result<()> {
        self.put(key, serde_json::to_value(record)?).await
    }

    async fn put_new_as<T: Serialize + Sync>(&self, key: &str, record: &T) -> Result<bool> {
        self.put_if_absent(key, serde_json::to_value(record)?).await
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}
