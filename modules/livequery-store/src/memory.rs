//! In-memory RecordStore for tests and local runs. Thread-safe.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::traits::{RecordStore, UpdateOutcome};

#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<BTreeMap<String, Value>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records (for test assertions).
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn merge(
        &self,
        key: &str,
        patch: Value,
        guard: Option<(&str, &str)>,
    ) -> Result<UpdateOutcome> {
        let Value::Object(fields) = patch else {
            bail!("update patch for {key} must be a JSON object");
        };

        let mut records = self.lock()?;
        let Some(existing) = records.get_mut(key) else {
            return Ok(UpdateOutcome::Missing);
        };
        if let Some((field, value)) = guard {
            if existing.get(field).and_then(Value::as_str) == Some(value) {
                return Ok(UpdateOutcome::Skipped);
            }
        }
        let Value::Object(target) = existing else {
            bail!("record {key} is not a JSON object");
        };
        for (field, value) in fields {
            target.insert(field, value);
        }
        Ok(UpdateOutcome::Updated)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Value>>> {
        self.records
            .lock()
            .map_err(|_| anyhow!("memory record store lock poisoned"))
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn put(&self, key: &str, record: Value) -> Result<()> {
        self.lock()?.insert(key.to_string(), record);
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, record: Value) -> Result<bool> {
        let mut records = self.lock()?;
        if records.contains_key(key) {
            return Ok(false);
        }
        records.insert(key.to_string(), record);
        Ok(true)
    }

    async fn update(&self, key: &str, patch: Value) -> Result<UpdateOutcome> {
        self.merge(key, patch, None)
    }

    async fn update_unless(
        &self,
        key: &str,
        patch: Value,
        field: &str,
        value: &str,
    ) -> Result<UpdateOutcome> {
        self.merge(key, patch, Some((field, value)))
    }

    async fn scan(&self) -> Result<Vec<Value>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    async fn find_by(&self, field: &str, value: &str) -> Result<Vec<Value>> {
        Ok(self
            .lock()?
            .values()
            .filter(|r| r.get(field).and_then(Value::as_str) == Some(value))
            .cloned()
            .collect())
    }
}
