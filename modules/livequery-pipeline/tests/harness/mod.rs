//! Shared setup for pipeline integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use livequery_common::{ProductSnapshot, QuestionRecord, QueueMessage, DEDUP_LOG_KEY};
use livequery_pipeline::testing::ScriptedModel;
use livequery_pipeline::{BatchProcessor, PipelineConfig, PipelineDeps, QuestionSelector};
use livequery_store::{MemoryRecordStore, RecordStore, RecordStoreExt};
use serde_json::json;

pub const PRODUCT_INFO: &str = "Aurora 55\" OLED TV. Price: $999. Ships to the US and Canada.";

/// Queue messages carrying one comment each.
pub fn messages(texts: &[&str]) -> Vec<QueueMessage> {
    texts
        .iter()
        .map(|text| QueueMessage::new(json!({"text": text, "author": "viewer"}).to_string()))
        .collect()
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub struct TestPipeline {
    pub comments: Arc<dyn RecordStore>,
    pub snapshots: Arc<MemoryRecordStore>,
    pub model: Arc<ScriptedModel>,
    pub processor: BatchProcessor,
}

impl TestPipeline {
    pub fn new(model: ScriptedModel, selector: Option<Arc<dyn QuestionSelector>>) -> Self {
        Self::with(
            Arc::new(MemoryRecordStore::new()),
            model,
            selector,
            PipelineConfig::default(),
        )
    }

    pub fn with(
        comments: Arc<dyn RecordStore>,
        model: ScriptedModel,
        selector: Option<Arc<dyn QuestionSelector>>,
        config: PipelineConfig,
    ) -> Self {
        let snapshots = Arc::new(MemoryRecordStore::new());
        let model = Arc::new(model);
        let processor = build_processor(
            comments.clone(),
            snapshots.clone(),
            model.clone(),
            selector,
            config,
        );
        Self {
            comments,
            snapshots,
            model,
            processor,
        }
    }

    pub async fn seed_product(&self) {
        self.snapshots
            .put_as("tv.txt", &ProductSnapshot::ready("tv.txt", PRODUCT_INFO))
            .await
            .unwrap();
    }

    pub async fn questions(&self) -> Vec<QuestionRecord> {
        questions_in(self.comments.as_ref()).await
    }

    pub async fn log(&self) -> Option<Vec<String>> {
        log_in(self.comments.as_ref()).await
    }
}

pub fn build_processor(
    comments: Arc<dyn RecordStore>,
    snapshots: Arc<dyn RecordStore>,
    model: Arc<ScriptedModel>,
    selector: Option<Arc<dyn QuestionSelector>>,
    config: PipelineConfig,
) -> BatchProcessor {
    let deps = match selector {
        Some(selector) => PipelineDeps::builder()
            .comments(comments)
            .snapshots(snapshots)
            .model(model)
            .selector(selector)
            .config(config)
            .build(),
        None => PipelineDeps::builder()
            .comments(comments)
            .snapshots(snapshots)
            .model(model)
            .config(config)
            .build(),
    };
    BatchProcessor::new(deps)
}

/// Question records in `store`, ordered by key.
pub async fn questions_in(store: &dyn RecordStore) -> Vec<QuestionRecord> {
    store
        .scan()
        .await
        .unwrap()
        .into_iter()
        .filter_map(|row| serde_json::from_value::<QuestionRecord>(row).ok())
        .collect()
}

/// Contents of the processed-questions log, if one was written.
pub async fn log_in(store: &dyn RecordStore) -> Option<Vec<String>> {
    store.get(DEDUP_LOG_KEY).await.unwrap().map(|value| {
        serde_json::from_value::<Vec<String>>(value["questions"].clone()).unwrap()
    })
}
