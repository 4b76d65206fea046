// Test doubles for the pipeline's three seams.
//
// - ScriptedModel (ChatModel): prompt-substring → canned reply, with delays
//   and an in-flight high-water mark
// - StubSelector (QuestionSelector): fixed selection, optional barrier
// - FlakyStore (RecordStore): MemoryRecordStore that fails on chosen keys

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ai_client::{AiError, ChatModel, ChatResponse, Message};
use anyhow::{bail, Result};
use async_trait::async_trait;
use livequery_store::{MemoryRecordStore, RecordStore, UpdateOutcome};
use serde_json::Value;
use tokio::sync::Barrier;

use crate::selector::QuestionSelector;

// ---------------------------------------------------------------------------
// ScriptedModel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Reply {
    /// OpenAI-compatible shape.
    Choices(String),
    /// Native `completion_message` shape.
    Completion(String),
    /// Arbitrary response body, run through the real decoder.
    Body(Value),
    NetworkError,
    Status(u16),
    /// Never completes.
    Hang,
}

struct Rule {
    needle: String,
    reply: Reply,
    delay: Option<Duration>,
}

/// Chat model that answers from a script. The first rule whose needle occurs
/// in the prompt wins; otherwise the default reply is used.
pub struct ScriptedModel {
    rules: Vec<Rule>,
    default: Reply,
    default_delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default: Reply::Choices("Mock answer".into()),
            default_delay: None,
            prompts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn on(mut self, needle: &str, reply: Reply) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            reply,
            delay: None,
        });
        self
    }

    pub fn default_reply(mut self, reply: Reply) -> Self {
        self.default = reply;
        self
    }

    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Highest number of calls that were in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn pick(&self, prompt: &str) -> (Reply, Option<Duration>) {
        self.rules
            .iter()
            .find(|rule| prompt.contains(&rule.needle))
            .map(|rule| (rule.reply.clone(), rule.delay))
            .unwrap_or_else(|| (self.default.clone(), self.default_delay))
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, messages: Vec<Message>) -> Result<ChatResponse, AiError> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let (reply, delay) = self.pick(&prompt);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Reply::Choices(content) => Ok(ChatResponse::Choices { content }),
            Reply::Completion(text) => Ok(ChatResponse::CompletionMessage { text }),
            Reply::Body(body) => ChatResponse::decode(&body),
            Reply::NetworkError => Err(AiError::Network("connection refused".into())),
            Reply::Status(status) => Err(AiError::Api {
                status,
                body: "scripted failure".into(),
            }),
            Reply::Hang => std::future::pending::<Result<ChatResponse, AiError>>().await,
        }
    }
}

// ---------------------------------------------------------------------------
// StubSelector
// ---------------------------------------------------------------------------

/// Selector that returns a fixed list and records what it was asked.
pub struct StubSelector {
    selection: Vec<String>,
    fail: bool,
    barrier: Option<Arc<Barrier>>,
    calls: Mutex<Vec<(Vec<String>, Vec<String>)>>,
}

impl StubSelector {
    pub fn new(selection: &[&str]) -> Self {
        Self {
            selection: selection.iter().map(|s| s.to_string()).collect(),
            fail: false,
            barrier: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails as if the model were unreachable.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(&[])
        }
    }

    /// Wait on `barrier` before answering, to line up concurrent batches.
    pub fn with_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    /// `(new_comments, processed_questions)` per call.
    pub fn calls(&self) -> Vec<(Vec<String>, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuestionSelector for StubSelector {
    async fn select(
        &self,
        new_comments: &[String],
        processed_questions: &[String],
    ) -> Result<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .push((new_comments.to_vec(), processed_questions.to_vec()));

        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if self.fail {
            bail!("selector unavailable");
        }
        Ok(self.selection.clone())
    }
}

// ---------------------------------------------------------------------------
// FlakyStore
// ---------------------------------------------------------------------------

/// MemoryRecordStore with injectable failures.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryRecordStore,
    fail_get: HashSet<String>,
    fail_put: HashSet<String>,
    fail_inserts_containing: Vec<String>,
    fail_scan: bool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_get(mut self, key: &str) -> Self {
        self.fail_get.insert(key.to_string());
        self
    }

    pub fn fail_put(mut self, key: &str) -> Self {
        self.fail_put.insert(key.to_string());
        self
    }

    /// Fail `put_if_absent` for records whose JSON contains `needle`.
    pub fn fail_inserts_containing(mut self, needle: &str) -> Self {
        self.fail_inserts_containing.push(needle.to_string());
        self
    }

    pub fn fail_scan(mut self) -> Self {
        self.fail_scan = true;
        self
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        if self.fail_get.contains(key) {
            bail!("injected get failure for {key}");
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, record: Value) -> Result<()> {
        if self.fail_put.contains(key) {
            bail!("injected put failure for {key}");
        }
        self.inner.put(key, record).await
    }

    async fn put_if_absent(&self, key: &str, record: Value) -> Result<bool> {
        let raw = record.to_string();
        if self.fail_inserts_containing.iter().any(|n| raw.contains(n)) {
            bail!("injected insert failure for {key}");
        }
        self.inner.put_if_absent(key, record).await
    }

    async fn update(&self, key: &str, patch: Value) -> Result<UpdateOutcome> {
        self.inner.update(key, patch).await
    }

    async fn update_unless(
        &self,
        key: &str,
        patch: Value,
        field: &str,
        value: &str,
    ) -> Result<UpdateOutcome> {
        self.inner.update_unless(key, patch, field, value).await
    }

    async fn scan(&self) -> Result<Vec<Value>> {
        if self.fail_scan {
            bail!("injected scan failure");
        }
        self.inner.scan().await
    }

    async fn find_by(&self, field: &str, value: &str) -> Result<Vec<Value>> {
        self.inner.find_by(field, value).await
    }
}
