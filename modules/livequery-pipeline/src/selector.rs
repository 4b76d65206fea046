//! Picks new, non-duplicate questions out of a batch of comments.

use std::sync::Arc;

use ai_client::{extract_json_object, truncate_to_char_boundary, ChatModel};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::prompts;

#[async_trait]
pub trait QuestionSelector: Send + Sync {
    /// Representative new questions from `new_comments`, excluding anything
    /// already covered by `processed_questions`.
    ///
    /// An empty result is a normal outcome. `Err` means the selection could
    /// not be attempted at all and the batch should be retried.
    async fn select(
        &self,
        new_comments: &[String],
        processed_questions: &[String],
    ) -> Result<Vec<String>>;
}

/// Selection by a single model call.
pub struct LlmQuestionSelector {
    model: Arc<dyn ChatModel>,
    max_questions: usize,
}

impl LlmQuestionSelector {
    pub fn new(model: Arc<dyn ChatModel>, max_questions: usize) -> Self {
        Self {
            model,
            max_questions,
        }
    }
}

#[async_trait]
impl QuestionSelector for LlmQuestionSelector {
    async fn select(
        &self,
        new_comments: &[String],
        processed_questions: &[String],
    ) -> Result<Vec<String>> {
        let prompt =
            prompts::selection_prompt(new_comments, processed_questions, self.max_questions);

        info!(
            model = self.model.model(),
            comments = new_comments.len(),
            history = processed_questions.len(),
            "Selecting questions"
        );

        let response = match self.model.prompt(&prompt).await {
            Ok(response) => response,
            Err(e) if e.is_format_miss() => {
                warn!(error = %e, "Invalid response format from selector model");
                return Ok(Vec::new());
            }
            Err(e) => return Err(anyhow!(e).context("question selection call failed")),
        };

        let selected = parse_selection(response.text(), self.max_questions);
        info!(selected = selected.len(), "Selector returned questions");
        Ok(selected)
    }
}

#[derive(Deserialize)]
struct SelectionWire {
    #[serde(default)]
    newly_selected_questions: Vec<Value>,
}

/// Read `newly_selected_questions` out of free-form model text.
///
/// Anything unreadable yields an empty list. Non-string and blank entries are
/// dropped and at most `max` questions are kept.
pub fn parse_selection(text: &str, max: usize) -> Vec<String> {
    let Some(json) = extract_json_object(text) else {
        warn!(
            response = truncate_to_char_boundary(text, 200),
            "No valid JSON found in selector response"
        );
        return Vec::new();
    };

    let wire: SelectionWire = match serde_json::from_str(json) {
        Ok(wire) => wire,
        Err(e) => {
            warn!(error = %e, "Selector JSON did not parse");
            return Vec::new();
        }
    };

    let questions: Vec<String> = wire
        .newly_selected_questions
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            other => {
                debug!(entry = %other, "Dropping unusable selector entry");
                None
            }
        })
        .take(max)
        .collect();

    questions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedModel};

    #[test]
    fn parses_json_wrapped_in_prose() {
        let text = concat!(
            "Here you go:\n```json\n",
            "{\n  \"newly_selected_questions\": [\"What's the price?\"]\n}\n```",
        );
        assert_eq!(parse_selection(text, 5), vec!["What's the price?"]);
    }

    #[test]
    fn no_braces_means_no_questions() {
        assert!(parse_selection("I could not find any questions.", 5).is_empty());
    }

    #[test]
    fn invalid_json_means_no_questions() {
        assert!(parse_selection("{ newly_selected_questions: [oops }", 5).is_empty());
    }

    #[test]
    fn missing_key_means_no_questions() {
        assert!(parse_selection(r#"{"questions": ["a"]}"#, 5).is_empty());
    }

    #[test]
    fn wrong_type_means_no_questions() {
        assert!(parse_selection(r#"{"newly_selected_questions": "a"}"#, 5).is_empty());
    }

    #[test]
    fn drops_non_strings_and_caps_length() {
        let text =
            r#"{"newly_selected_questions": ["a", 1, null, " ", "b", "c", "d", "e", "f", "g"]}"#;
        assert_eq!(parse_selection(text, 5), vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn selector_reads_completion_message_shape() {
        let model = Arc::new(ScriptedModel::new().default_reply(Reply::Completion(
            r#"{"newly_selected_questions": ["Is it waterproof?"]}"#.into(),
        )));
        let selector = LlmQuestionSelector::new(model.clone(), 5);

        let selected = selector
            .select(&["Is it waterproof??".into()], &[])
            .await
            .unwrap();
        assert_eq!(selected, vec!["Is it waterproof?"]);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Is it waterproof??"));
    }

    #[tokio::test]
    async fn prompt_carries_the_selector_cap() {
        let model = Arc::new(ScriptedModel::new().default_reply(Reply::Completion(
            r#"{"newly_selected_questions": ["a", "b", "c"]}"#.into(),
        )));
        let selector = LlmQuestionSelector::new(model.clone(), 2);

        let selected = selector.select(&["hi".into()], &[]).await.unwrap();

        assert_eq!(selected, vec!["a", "b"]);
        assert!(model.prompts()[0].contains("at most 2 questions"));
    }

    #[tokio::test]
    async fn unrecognized_shape_selects_nothing() {
        let model = Arc::new(
            ScriptedModel::new().default_reply(Reply::Body(serde_json::json!({"output": "?"}))),
        );
        let selector = LlmQuestionSelector::new(model, 5);
        assert!(selector.select(&["hi".into()], &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_an_error() {
        let model = Arc::new(ScriptedModel::new().default_reply(Reply::NetworkError));
        let selector = LlmQuestionSelector::new(model, 5);
        assert!(selector.select(&["hi".into()], &[]).await.is_err());
    }
}
