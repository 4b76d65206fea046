use std::time::Duration;

use livequery_common::Config;

use crate::resolver::AnswerFailurePolicy;

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on questions kept from one selection call.
    pub max_selected_questions: usize,
    /// Maximum in-flight answer calls per batch.
    pub answer_concurrency: usize,
    /// Deadline for a single answer call.
    pub answer_timeout: Duration,
    pub failure_policy: AnswerFailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_selected_questions: 5,
            answer_concurrency: 10,
            answer_timeout: Duration::from_secs(30),
            failure_policy: AnswerFailurePolicy::default(),
        }
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_selected_questions: config.max_selected_questions,
            answer_concurrency: config.answer_concurrency.max(1),
            answer_timeout: Duration::from_secs(config.llm_timeout_secs),
            failure_policy: AnswerFailurePolicy::default(),
        }
    }
}
