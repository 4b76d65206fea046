use async_trait::async_trait;
use std::sync::Arc;

use crate::error::AiError;
use crate::response::ChatResponse;

// =============================================================================
// Message Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// ChatModel Trait
// =============================================================================

/// A generative model reachable over a chat-completions style API.
///
/// Transport problems (network, timeout, non-2xx) and unreadable responses are
/// both reported as `AiError`; use [`AiError::is_format_miss`] to tell them
/// apart.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier sent with every request.
    fn model(&self) -> &str;

    async fn chat(&self, messages: Vec<Message>) -> Result<ChatResponse, AiError>;

    /// Single user-turn convenience.
    async fn prompt(&self, input: &str) -> Result<ChatResponse, AiError> {
        self.chat(vec![Message::user(input)]).await
    }
}

#[async_trait]
impl<M: ChatModel + ?Sized> ChatModel for Arc<M> {
    fn model(&self) -> &str {
        (**self).model()
    }

    async fn chat(&self, messages: Vec<Message>) -> Result<ChatResponse, AiError> {
        (**self).chat(messages).await
    }
}
