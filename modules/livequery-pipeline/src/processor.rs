//! One queue batch, end to end.

use std::sync::Arc;

use ai_client::ChatModel;
use anyhow::{Context, Result};
use livequery_common::QueueMessage;
use livequery_store::RecordStore;
use tracing::{error, info, info_span, Instrument};
use typed_builder::TypedBuilder;

use crate::config::PipelineConfig;
use crate::dedup_log::DedupLogManager;
use crate::extract::extract_comment_texts;
use crate::questions::QuestionStore;
use crate::resolver::AnswerResolver;
use crate::selector::{LlmQuestionSelector, QuestionSelector};
use crate::snapshots::SnapshotReader;
use crate::stats::BatchStats;

/// Long-lived collaborators for a pipeline instance.
#[derive(Clone, TypedBuilder)]
pub struct PipelineDeps {
    /// Question records and the processed-questions log.
    pub comments: Arc<dyn RecordStore>,
    /// Product snapshots written by file ingestion.
    pub snapshots: Arc<dyn RecordStore>,
    pub model: Arc<dyn ChatModel>,
    /// Defaults to an `LlmQuestionSelector` over `model`.
    #[builder(default, setter(strip_option))]
    pub selector: Option<Arc<dyn QuestionSelector>>,
    #[builder(default)]
    pub config: PipelineConfig,
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BatchStage {
    Extract,
    DedupContext,
    Select,
    PersistInitiated,
    LogAppend,
    Resolve,
    Done,
}

/// Why a batch stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchExit {
    /// No usable comment text in the batch; the selector was not called.
    NoComments,
    /// The selector picked nothing; nothing was persisted.
    NothingSelected,
    Completed,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Last stage that ran, or `Done` once answers were resolved.
    pub stage_reached: BatchStage,
    pub exit: BatchExit,
    pub stats: BatchStats,
}

pub struct BatchProcessor {
    dedup_log: DedupLogManager,
    selector: Arc<dyn QuestionSelector>,
    questions: QuestionStore,
    snapshots: SnapshotReader,
    resolver: AnswerResolver,
}

impl BatchProcessor {
    pub fn new(deps: PipelineDeps) -> Self {
        let questions = QuestionStore::new(deps.comments.clone());
        let snapshots = SnapshotReader::new(deps.snapshots.clone());
        let selector = deps.selector.unwrap_or_else(|| {
            Arc::new(LlmQuestionSelector::new(
                deps.model.clone(),
                deps.config.max_selected_questions,
            ))
        });
        let resolver = AnswerResolver::new(
            deps.model.clone(),
            questions.clone(),
            snapshots.clone(),
            &deps.config,
        );

        Self {
            dedup_log: DedupLogManager::new(deps.comments),
            selector,
            questions,
            snapshots,
            resolver,
        }
    }

    pub fn questions(&self) -> &QuestionStore {
        &self.questions
    }

    pub fn snapshots(&self) -> &SnapshotReader {
        &self.snapshots
    }

    /// Run one batch.
    ///
    /// Only a selector failure is returned as `Err`, so the host can
    /// redeliver the batch. Every other failure is logged, counted in the
    /// stats and skipped.
    pub async fn process(&self, messages: &[QueueMessage]) -> Result<BatchOutcome> {
        let span = info_span!("batch", messages = messages.len());
        self.run(messages).instrument(span).await
    }

    async fn run(&self, messages: &[QueueMessage]) -> Result<BatchOutcome> {
        let mut stats = BatchStats {
            messages: messages.len() as u32,
            ..Default::default()
        };

        // Extract
        let extraction = extract_comment_texts(messages);
        stats.malformed = extraction.malformed;
        stats.duplicates = extraction.duplicates;
        stats.unique_comments = extraction.texts.len() as u32;
        if extraction.texts.is_empty() {
            info!("No valid comments in batch");
            return Ok(finish(BatchStage::Extract, BatchExit::NoComments, stats));
        }

        // Dedup context
        let history = self.dedup_log.read().await;
        stats.history = history.len() as u32;

        // Select
        let selected = self
            .selector
            .select(&extraction.texts, &history)
            .await
            .inspect_err(|e| error!(error = %format!("{e:#}"), "Question selection failed"))
            .context("batch aborted at selection")?;
        stats.selected = selected.len() as u32;
        if selected.is_empty() {
            info!("No new questions selected");
            return Ok(finish(BatchStage::Select, BatchExit::NothingSelected, stats));
        }

        // Persist
        let (records, persist_failures) = self.questions.create_initiated_batch(&selected).await;
        stats.persisted = records.len() as u32;
        stats.persist_failures = persist_failures as u32;

        // Log append, with the full selection even if some inserts failed
        if let Err(e) = self.dedup_log.append(&history, &selected).await {
            error!(error = %format!("{e:#}"), "Failed to update question log");
            stats.log_append_failed = true;
        }

        // Resolve
        stats.resolve = self.resolver.resolve(&records).await;

        Ok(finish(BatchStage::Done, BatchExit::Completed, stats))
    }
}

fn finish(stage_reached: BatchStage, exit: BatchExit, stats: BatchStats) -> BatchOutcome {
    info!("{stats}");
    BatchOutcome {
        stage_reached,
        exit,
        stats,
    }
}
