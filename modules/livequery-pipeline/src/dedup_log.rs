//! The running log of already-selected questions.
//!
//! Read once at batch start, overwritten once at batch end. There is no
//! compare-and-swap: two batches that read before either writes will each
//! write their own extension of the same base, and the later write wins.
//! Selections lost that way may be selected again in a future batch.

use std::sync::Arc;

use anyhow::{Context, Result};
use livequery_common::{DedupLog, DEDUP_LOG_KEY};
use livequery_store::{RecordStore, RecordStoreExt};
use serde_json::Value;
use tracing::{info, warn};

#[derive(Clone)]
pub struct DedupLogManager {
    store: Arc<dyn RecordStore>,
}

impl DedupLogManager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Current log. A missing or unreadable log counts as empty history.
    /// Entries that are not strings are dropped; the rest are kept.
    pub async fn read(&self) -> Vec<String> {
        let record = match self.store.get(DEDUP_LOG_KEY).await {
            Ok(Some(record)) => record,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "Could not read question log, starting fresh");
                return Vec::new();
            }
        };

        let Some(Value::Array(entries)) = record.get("questions") else {
            warn!("Question log has no question list, starting fresh");
            return Vec::new();
        };

        let total = entries.len();
        let questions: Vec<String> = entries
            .iter()
            .filter_map(|entry| entry.as_str().map(str::to_string))
            .collect();
        if questions.len() < total {
            warn!(
                dropped = total - questions.len(),
                kept = questions.len(),
                "Skipping non-text entries in question log"
            );
        }
        questions
    }

    /// Overwrite the log with `existing` followed by `new_questions`.
    pub async fn append(&self, existing: &[String], new_questions: &[String]) -> Result<()> {
        let mut questions = Vec::with_capacity(existing.len() + new_questions.len());
        questions.extend_from_slice(existing);
        questions.extend_from_slice(new_questions);
        let total = questions.len();

        self.store
            .put_as(DEDUP_LOG_KEY, &DedupLog { questions })
            .await
            .context("failed to write processed questions log")?;

        info!(added = new_questions.len(), total, "Question log updated");
        Ok(())
    }
}
