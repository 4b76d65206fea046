//! Comment triage-and-answer pipeline.
//!
//! One `BatchProcessor::process` call per queue batch:
//! extract → dedup context → select → persist INITIATED → log append → resolve.

pub mod config;
pub mod dedup_log;
pub mod extract;
pub mod processor;
pub mod prompts;
pub mod questions;
pub mod resolver;
pub mod selector;
pub mod snapshots;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::PipelineConfig;
pub use dedup_log::DedupLogManager;
pub use processor::{BatchExit, BatchOutcome, BatchProcessor, BatchStage, PipelineDeps};
pub use questions::QuestionStore;
pub use resolver::{
    AnswerFailurePolicy, AnswerResolver, AI_API_ERROR, NO_PRODUCT_INFO, NO_VALID_ANSWER,
};
pub use selector::{LlmQuestionSelector, QuestionSelector};
pub use snapshots::SnapshotReader;
pub use stats::{BatchStats, ResolveSummary};
