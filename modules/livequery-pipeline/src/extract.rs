//! Pull comment texts out of raw queue messages.

use std::collections::HashSet;

use livequery_common::QueueMessage;
use serde_json::Value;
use tracing::warn;

/// Unique comment texts from one batch, in first-seen order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub texts: Vec<String>,
    /// Messages skipped because they carried no usable `text`.
    pub malformed: u32,
    /// Messages dropped as exact duplicates of an earlier text.
    pub duplicates: u32,
}

pub fn extract_comment_texts(messages: &[QueueMessage]) -> Extraction {
    let mut extraction = Extraction::default();
    let mut seen = HashSet::new();

    for message in messages {
        let text = match comment_text(&message.body) {
            Ok(text) => text,
            Err(reason) => {
                warn!(message_id = %message.message_id, reason, "Skipping malformed message");
                extraction.malformed += 1;
                continue;
            }
        };

        if seen.insert(text.clone()) {
            extraction.texts.push(text);
        } else {
            extraction.duplicates += 1;
        }
    }

    extraction
}

fn comment_text(body: &str) -> Result<String, &'static str> {
    let value: Value = serde_json::from_str(body).map_err(|_| "body is not JSON")?;
    match value.get("text") {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.clone()),
        Some(Value::String(_)) => Err("text is blank"),
        Some(_) => Err("text is not a string"),
        None if value.is_object() => Err("text field missing"),
        None => Err("body is not a JSON object"),
    }
}
