use std::env;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Model API
    pub llama_api_key: String,
    pub llama_api_url: String,
    pub llama_model: String,
    pub llm_timeout_secs: u64,

    // Pipeline
    pub answer_concurrency: usize,
    pub max_selected_questions: usize,

    // Storage
    pub database_url: Option<String>,
    pub comments_table: String,
    pub processing_table: String,

    // Web server
    pub api_host: String,
    pub api_port: u16,

    // Queue host
    pub queue_batch_size: usize,
    pub queue_batch_window_ms: u64,
    pub queue_max_receive_count: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            llama_api_key: env::var("LLAMA_API_KEY")
                .map_err(|_| anyhow!("LLAMA_API_KEY environment variable is required"))?,
            llama_api_url: env_or("LLAMA_API_URL", "https://api.llama.com/v1"),
            llama_model: env_or("LLAMA_MODEL", "Llama-4-Maverick-17B-128E-Instruct-FP8"),
            llm_timeout_secs: parse_env("LLM_TIMEOUT_SECS", 30)?,
            answer_concurrency: parse_env("ANSWER_CONCURRENCY", 10)?,
            max_selected_questions: parse_env("MAX_SELECTED_QUESTIONS", 5)?,
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            comments_table: env_or("COMMENTS_TABLE_NAME", "comments"),
            processing_table: env_or("PROCESSING_TABLE_NAME", "file_processing_status"),
            api_host: env_or("API_HOST", "0.0.0.0"),
            api_port: parse_env("API_PORT", 3000)?,
            queue_batch_size: parse_env("QUEUE_BATCH_SIZE", 10)?,
            queue_batch_window_ms: parse_env("QUEUE_BATCH_WINDOW_MS", 2000)?,
            queue_max_receive_count: parse_env("QUEUE_MAX_RECEIVE_COUNT", 3)?,
        };

        if config.answer_concurrency == 0 {
            return Err(anyhow!("ANSWER_CONCURRENCY must be at least 1"));
        }
        if config.queue_batch_size == 0 {
            return Err(anyhow!("QUEUE_BATCH_SIZE must be at least 1"));
        }

        Ok(config)
    }

    /// Log loaded settings with secrets redacted.
    pub fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            let n = val.char_indices().nth(5).map(|(i, _)| i).unwrap_or(val.len());
            format!("{}...({} chars)", &val[..n], val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  LLAMA_API_KEY: {}", preview(&self.llama_api_key));
        tracing::info!("  LLAMA_API_URL: {}", self.llama_api_url);
        tracing::info!("  LLAMA_MODEL: {}", self.llama_model);
        tracing::info!(
            "  DATABASE_URL: {}",
            match &self.database_url {
                Some(url) => preview(url),
                None => "<not set, using in-memory store>".to_string(),
            }
        );
        tracing::info!(
            "  tables: comments={} processing={}",
            self.comments_table,
            self.processing_table
        );
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}
