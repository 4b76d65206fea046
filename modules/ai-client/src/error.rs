use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unrecognized response format: {0}")]
    UnrecognizedFormat(String),
}

impl AiError {
    /// The model answered, but not in a shape we can read.
    ///
    /// Everything else means the call itself did not complete.
    pub fn is_format_miss(&self) -> bool {
        matches!(self, AiError::Parse(_) | AiError::UnrecognizedFormat(_))
    }
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AiError::Timeout(e.to_string())
        } else {
            AiError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for AiError {
    fn from(e: serde_json::Error) -> Self {
        AiError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_misses_are_distinguished_from_transport_failures() {
        assert!(AiError::UnrecognizedFormat("{}".into()).is_format_miss());
        assert!(AiError::Parse("eof".into()).is_format_miss());
        assert!(!AiError::Timeout("30s".into()).is_format_miss());
        assert!(!AiError::Network("refused".into()).is_format_miss());
        assert!(!AiError::Api {
            status: 500,
            body: "boom".into()
        }
        .is_format_miss());
    }
}
