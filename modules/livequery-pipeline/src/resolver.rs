//! Answers INITIATED questions against the current product snapshot.

use std::sync::Arc;
use std::time::Duration;

use ai_client::{truncate_to_char_boundary, ChatModel};
use futures::stream::{self, StreamExt};
use livequery_common::QuestionRecord;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::prompts;
use crate::questions::QuestionStore;
use crate::snapshots::SnapshotReader;
use crate::stats::ResolveSummary;

pub const NO_PRODUCT_INFO: &str = "(No product info available, cannot answer.)";
pub const NO_VALID_ANSWER: &str = "(No valid answer received.)";
pub const AI_API_ERROR: &str = "(AI API error, unable to generate answer.)";

/// Where a question goes when its answer call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnswerFailurePolicy {
    /// READY with a placeholder answer.
    #[default]
    ReadyWithPlaceholder,
    /// FAILED with the same placeholder.
    MarkFailed,
}

enum Answer {
    Model(String),
    NoContext,
    CallFailed(&'static str),
}

#[derive(Clone)]
pub struct AnswerResolver {
    model: Arc<dyn ChatModel>,
    questions: QuestionStore,
    snapshots: SnapshotReader,
    concurrency: usize,
    timeout: Duration,
    policy: AnswerFailurePolicy,
}

impl AnswerResolver {
    pub fn new(
        model: Arc<dyn ChatModel>,
        questions: QuestionStore,
        snapshots: SnapshotReader,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            model,
            questions,
            snapshots,
            concurrency: config.answer_concurrency.max(1),
            timeout: config.answer_timeout,
            policy: config.failure_policy,
        }
    }

    /// Move every record in `records` out of INITIATED.
    ///
    /// The snapshot is read once for the whole set. Answer calls run with at
    /// most `concurrency` in flight and finish in any order; one question's
    /// failure never affects another.
    pub async fn resolve(&self, records: &[QuestionRecord]) -> ResolveSummary {
        let mut summary = ResolveSummary::default();
        if records.is_empty() {
            return summary;
        }

        let product_info: Option<Arc<str>> = match self.snapshots.latest_ready().await {
            Ok(snapshot) => snapshot.and_then(|s| s.raw).map(Arc::from),
            Err(e) => {
                warn!(error = %e, "Could not read product snapshots, answering without context");
                None
            }
        };
        if product_info.is_none() {
            warn!(questions = records.len(), "No product info available");
        }

        info!(
            questions = records.len(),
            concurrency = self.concurrency,
            "Resolving answers"
        );

        // Each answer future owns its inputs so the stream stays Send.
        let results: Vec<(Answer, bool)> = stream::iter(records.to_vec())
            .map(|record| {
                let resolver = self.clone();
                let product_info = product_info.clone();
                async move { resolver.resolve_one(record, product_info).await }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (answer, stored) in results {
            match answer {
                Answer::Model(_) => summary.answered += 1,
                Answer::NoContext => summary.no_context += 1,
                Answer::CallFailed(_) => summary.call_failures += 1,
            }
            if !stored {
                summary.update_errors += 1;
            }
        }

        info!(
            answered = summary.answered,
            no_context = summary.no_context,
            call_failures = summary.call_failures,
            update_errors = summary.update_errors,
            "Answers resolved"
        );
        summary
    }

    async fn resolve_one(
        &self,
        record: QuestionRecord,
        product_info: Option<Arc<str>>,
    ) -> (Answer, bool) {
        let answer = match product_info.as_deref() {
            Some(info) => self.answer(info, &record.question_text).await,
            None => Answer::NoContext,
        };

        let result = match (&answer, self.policy) {
            (Answer::Model(text), _) => self.questions.mark_ready(&record.id, text).await,
            (Answer::NoContext, _) => {
                self.questions.mark_ready(&record.id, NO_PRODUCT_INFO).await
            }
            (Answer::CallFailed(placeholder), AnswerFailurePolicy::ReadyWithPlaceholder) => {
                self.questions.mark_ready(&record.id, placeholder).await
            }
            (Answer::CallFailed(placeholder), AnswerFailurePolicy::MarkFailed) => {
                self.questions.mark_failed(&record.id, placeholder).await
            }
        };

        match result {
            Ok(()) => (answer, true),
            Err(e) => {
                error!(id = %record.id, error = %e, "Failed to store answer");
                (answer, false)
            }
        }
    }

    async fn answer(&self, product_info: &str, question: &str) -> Answer {
        let prompt = prompts::answer_prompt(product_info, question);

        match tokio::time::timeout(self.timeout, self.model.prompt(&prompt)).await {
            Err(_) => {
                warn!(question, timeout_secs = self.timeout.as_secs(), "Answer call timed out");
                Answer::CallFailed(AI_API_ERROR)
            }
            Ok(Err(e)) if e.is_format_miss() => {
                warn!(question, error = %e, "Invalid answer response format");
                Answer::CallFailed(NO_VALID_ANSWER)
            }
            Ok(Err(e)) => {
                warn!(question, error = %e, "Answer call failed");
                Answer::CallFailed(AI_API_ERROR)
            }
            Ok(Ok(response)) => {
                let text = response.text().trim();
                if text.is_empty() {
                    warn!(question, "Empty answer from model");
                    Answer::CallFailed(NO_VALID_ANSWER)
                } else {
                    debug!(
                        question,
                        answer = truncate_to_char_boundary(text, 200),
                        "Answer received"
                    );
                    Answer::Model(text.to_string())
                }
            }
        }
    }
}
