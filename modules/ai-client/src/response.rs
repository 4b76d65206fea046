//! Response decoding for chat-completions style APIs.
//!
//! The Llama API answers in one of two shapes depending on the endpoint
//! version: the OpenAI-compatible `choices[0].message.content`, or its native
//! `completion_message.content.text`. Decoders are tried in order and the
//! first match wins; anything else is `AiError::UnrecognizedFormat`.

use serde::Deserialize;
use serde_json::Value;

use crate::error::AiError;
use crate::util::truncate_to_char_boundary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatResponse {
    /// `{"choices": [{"message": {"role": "...", "content": "..."}}]}`
    Choices { content: String },
    /// `{"completion_message": {"content": {"type": "text", "text": "..."}}}`
    CompletionMessage { text: String },
}

type Decoder = fn(&Value) -> Option<ChatResponse>;

const DECODERS: &[Decoder] = &[decode_choices, decode_completion_message];

impl ChatResponse {
    pub fn decode(body: &Value) -> Result<Self, AiError> {
        DECODERS
            .iter()
            .find_map(|decode| decode(body))
            .ok_or_else(|| {
                let raw = body.to_string();
                AiError::UnrecognizedFormat(truncate_to_char_boundary(&raw, 200).to_string())
            })
    }

    /// The generated text, whichever shape it arrived in.
    pub fn text(&self) -> &str {
        match self {
            ChatResponse::Choices { content } => content,
            ChatResponse::CompletionMessage { text } => text,
        }
    }
}

// =============================================================================
// Wire shapes
// =============================================================================

#[derive(Deserialize)]
struct ChoicesShape {
    choices: Vec<ChoiceWire>,
}

#[derive(Deserialize)]
struct ChoiceWire {
    message: ChoiceMessageWire,
}

#[derive(Deserialize)]
struct ChoiceMessageWire {
    content: String,
}

#[derive(Deserialize)]
struct CompletionShape {
    completion_message: CompletionMessageWire,
}

#[derive(Deserialize)]
struct CompletionMessageWire {
    content: CompletionContentWire,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CompletionContentWire {
    Text { text: String },
    Plain(String),
}

fn decode_choices(body: &Value) -> Option<ChatResponse> {
    let shape = ChoicesShape::deserialize(body).ok()?;
    let first = shape.choices.into_iter().next()?;
    Some(ChatResponse::Choices {
        content: first.message.content,
    })
}

fn decode_completion_message(body: &Value) -> Option<ChatResponse> {
    let shape = CompletionShape::deserialize(body).ok()?;
    let text = match shape.completion_message.content {
        CompletionContentWire::Text { text } => text,
        CompletionContentWire::Plain(text) => text,
    };
    Some(ChatResponse::CompletionMessage { text })
}
