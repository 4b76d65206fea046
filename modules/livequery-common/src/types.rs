use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key of the singleton record holding already-selected questions.
pub const DEDUP_LOG_KEY: &str = "processed_questions_log";

// --- Comments and queue messages ---

/// A viewer comment as produced by an ingestion source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl Comment {
    /// A comment submitted by hand through the ingest endpoint.
    pub fn manual(text: impl Into<String>) -> Self {
        Self {
            id: format!("manual-{}", Uuid::new_v4()),
            author: "manual_tester".to_string(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

/// One opaque message as delivered by the queue.
///
/// `body` is expected to be a JSON object with at least a `text` field,
/// but nothing guarantees it; the processor validates on extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub message_id: String,
    pub body: String,
    #[serde(default)]
    pub receive_count: u32,
}

impl QueueMessage {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            body: body.into(),
            receive_count: 0,
        }
    }

    pub fn from_comment(comment: &Comment) -> serde_json::Result<Self> {
        Ok(Self::new(serde_json::to_string(comment)?))
    }
}

// --- Question lifecycle ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionStatus {
    Initiated,
    Ready,
    Failed,
    Consumed,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Initiated => "INITIATED",
            QuestionStatus::Ready => "READY",
            QuestionStatus::Failed => "FAILED",
            QuestionStatus::Consumed => "CONSUMED",
        }
    }

    /// Whether the answer pipeline is done with a record in this state.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, QuestionStatus::Initiated)
    }
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A selected question and, eventually, its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: String,
    pub question_text: String,
    pub status: QuestionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuestionRecord {
    /// Fresh INITIATED record. Ids are never reused, even for identical text.
    pub fn initiated(question_text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("question-{}", Uuid::new_v4()),
            question_text: question_text.into(),
            status: QuestionStatus::Initiated,
            answer: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Previously selected questions, used as negative context for selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupLog {
    #[serde(default)]
    pub questions: Vec<String>,
}

// --- Product context ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotStatus {
    Initiated,
    Ready,
    Failed,
}

/// Raw product description produced by file ingestion.
/// Time fields are epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub file_key: String,
    pub status: SnapshotStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ProductSnapshot {
    pub fn ready(file_key: impl Into<String>, raw: impl Into<String>) -> Self {
        let now = Utc::now().timestamp();
        Self {
            file_key: file_key.into(),
            status: SnapshotStatus::Ready,
            raw: Some(raw.into()),
            result: None,
            timestamp: Some(now),
            processed_at: Some(now),
            error_message: None,
        }
    }

    /// READY with non-empty raw text.
    pub fn is_usable(&self) -> bool {
        self.status == SnapshotStatus::Ready
            && self.raw.as_deref().is_some_and(|r| !r.trim().is_empty())
    }

    /// Ordering key: `processed_at`, else `timestamp`, else 0.
    pub fn recency(&self) -> i64 {
        self.processed_at.or(self.timestamp).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_value(QuestionStatus::Initiated).unwrap(),
            json!("INITIATED")
        );
        let parsed: QuestionStatus = serde_json::from_value(json!("CONSUMED")).unwrap();
        assert_eq!(parsed, QuestionStatus::Consumed);
        assert_eq!(QuestionStatus::Ready.to_string(), "READY");
    }

    #[test]
    fn initiated_records_get_distinct_ids() {
        let a = QuestionRecord::initiated("What's the price?");
        let b = QuestionRecord::initiated("What's the price?");
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("question-"));
        assert_eq!(a.status, QuestionStatus::Initiated);
        assert!(a.answer.is_none());
        assert!(!a.status.is_resolved());
    }

    #[test]
    fn snapshot_recency_falls_back_to_timestamp() {
        let mut snap = ProductSnapshot::ready("tv.txt", "A TV");
        snap.processed_at = None;
        snap.timestamp = Some(42);
        assert_eq!(snap.recency(), 42);
        snap.timestamp = None;
        assert_eq!(snap.recency(), 0);
    }

    #[test]
    fn snapshot_without_raw_is_not_usable() {
        let mut snap = ProductSnapshot::ready("tv.txt", "  ");
        assert!(!snap.is_usable());
        snap.raw = Some("A TV".into());
        assert!(snap.is_usable());
        snap.status = SnapshotStatus::Failed;
        assert!(!snap.is_usable());
    }

    #[test]
    fn snapshot_parses_sparse_records() {
        let snap: ProductSnapshot =
            serde_json::from_value(json!({"file_key": "a", "status": "INITIATED", "timestamp": 7}))
                .unwrap();
        assert_eq!(snap.raw, None);
        assert_eq!(snap.recency(), 7);
    }

    #[test]
    fn manual_comment_round_trips_through_queue_message() {
        let comment = Comment::manual("Is it waterproof?");
        let msg = QueueMessage::from_comment(&comment).unwrap();
        let body: serde_json::Value = serde_json::from_str(&msg.body).unwrap();
        assert_eq!(body["text"], "Is it waterproof?");
        assert_eq!(body["author"], "manual_tester");
        assert_eq!(msg.receive_count, 0);
    }
}
