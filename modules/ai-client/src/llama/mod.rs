mod client;
pub(crate) mod types;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AiError;
use crate::response::ChatResponse;
use crate::traits::{ChatModel, Message};

use client::LlamaClient;

pub const LLAMA_API_URL: &str = "https://api.llama.com/v1";
pub const DEFAULT_MODEL: &str = "Llama-4-Maverick-17B-128E-Instruct-FP8";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Llama Agent
// =============================================================================

#[derive(Clone)]
pub struct Llama {
    api_key: String,
    pub(crate) model: String,
    base_url: Option<String>,
    timeout: Duration,
    max_tokens: Option<u32>,
}

impl Llama {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            max_tokens: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Per-request deadline. A call that exceeds it fails with `AiError::Timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Get the API key.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn client(&self) -> Result<LlamaClient, AiError> {
        LlamaClient::new(
            &self.api_key,
            self.base_url.as_deref().unwrap_or(LLAMA_API_URL),
            self.timeout,
        )
    }
}

#[async_trait]
impl ChatModel for Llama {
    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: Vec<Message>) -> Result<ChatResponse, AiError> {
        let request = types::ChatRequest::new(&self.model)
            .messages(messages.into_iter().map(types::WireMessage::from))
            .max_tokens(self.max_tokens);

        let body = self.client()?.chat(&request).await?;
        ChatResponse::decode(&body)
    }
}
