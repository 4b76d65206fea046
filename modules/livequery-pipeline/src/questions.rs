//! Question records and their status transitions.
//!
//! INITIATED → READY | FAILED, READY → CONSUMED. Every transition is a
//! partial update that never recreates a record.
//!
//! An acknowledgement may land before the answer does. Answer writes are
//! therefore guarded: a CONSUMED record is never moved back to READY or
//! FAILED.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use livequery_common::{LiveQueryError, QuestionRecord, QuestionStatus};
use livequery_store::{RecordStore, RecordStoreExt, UpdateOutcome};
use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Clone)]
pub struct QuestionStore {
    store: Arc<dyn RecordStore>,
}

impl QuestionStore {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Insert a fresh INITIATED record for `question_text`.
    pub async fn create_initiated(&self, question_text: &str) -> Result<QuestionRecord> {
        let record = QuestionRecord::initiated(question_text);
        let created = self
            .store
            .put_new_as(&record.id, &record)
            .await
            .with_context(|| format!("failed to persist question {}", record.id))?;
        if !created {
            bail!("question id {} already exists", record.id);
        }
        Ok(record)
    }

    /// Insert one INITIATED record per question. Each insert stands alone;
    /// failures are logged and counted, never propagated.
    pub async fn create_initiated_batch(
        &self,
        questions: &[String],
    ) -> (Vec<QuestionRecord>, usize) {
        let mut created = Vec::with_capacity(questions.len());
        let mut failures = 0;

        for question in questions {
            match self.create_initiated(question).await {
                Ok(record) => {
                    info!(id = %record.id, question = %question, "Question saved as INITIATED");
                    created.push(record);
                }
                Err(e) => {
                    warn!(error = %e, question = %question, "Failed to save question");
                    failures += 1;
                }
            }
        }

        (created, failures)
    }

    pub async fn mark_ready(&self, id: &str, answer: &str) -> Result<(), LiveQueryError> {
        self.transition(id, QuestionStatus::Ready, Some(answer)).await
    }

    pub async fn mark_failed(&self, id: &str, answer: &str) -> Result<(), LiveQueryError> {
        self.transition(id, QuestionStatus::Failed, Some(answer)).await
    }

    /// Acknowledge delivery of an answer. Only requires the record to exist.
    pub async fn mark_consumed(&self, id: &str) -> Result<(), LiveQueryError> {
        self.transition(id, QuestionStatus::Consumed, None).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<QuestionRecord>> {
        self.store.get_as(id).await
    }

    /// READY records, ordered by creation time.
    pub async fn list_ready(&self) -> Result<Vec<QuestionRecord>> {
        let rows = self
            .store
            .find_by("status", QuestionStatus::Ready.as_str())
            .await
            .context("failed to list ready questions")?;

        let mut records: Vec<QuestionRecord> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed question record");
                    None
                }
            })
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn transition(
        &self,
        id: &str,
        status: QuestionStatus,
        answer: Option<&str>,
    ) -> Result<(), LiveQueryError> {
        let mut patch = json!({
            "status": status,
            "updated_at": Utc::now(),
        });
        if let (Some(answer), Value::Object(fields)) = (answer, &mut patch) {
            fields.insert("answer".into(), Value::String(answer.to_string()));
        }

        let result = match status {
            QuestionStatus::Ready | QuestionStatus::Failed => {
                let consumed = QuestionStatus::Consumed.as_str();
                self.store.update_unless(id, patch, "status", consumed).await
            }
            _ => self.store.update(id, patch).await,
        };

        match result {
            Ok(UpdateOutcome::Updated) => Ok(()),
            Ok(UpdateOutcome::Skipped) => {
                info!(id, status = %status, "Question already consumed, keeping it");
                Ok(())
            }
            Ok(UpdateOutcome::Missing) => Err(LiveQueryError::NotFound(format!("question {id}"))),
            Err(e) => Err(LiveQueryError::Store(format!("{e:#}"))),
        }
    }
}
