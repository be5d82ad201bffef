use thiserror::Error;

/// Failure taxonomy for the generation pipeline.
///
/// Only [`GenerationError::InvalidInput`] is ever returned from the public
/// pipeline entry points; every other variant is captured into the
/// `error` field of the URL's [`crate::types::GenerationResult`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("upstream responded with HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("circuit open for '{key}'")]
    CircuitOpen { key: String },

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GenerationError {
    /// Network-class failures are worth another attempt; everything else is
    /// either deterministic or a caller mistake.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Network(_) | GenerationError::Timeout => true,
            GenerationError::HttpStatus { status } => {
                matches!(*status, 408 | 429) || (500..600).contains(status)
            }
            _ => false,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, GenerationError::CircuitOpen { .. })
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerationError::Timeout
        } else if let Some(status) = e.status() {
            GenerationError::HttpStatus {
                status: status.as_u16(),
            }
        } else {
            GenerationError::Network(e.to_string())
        }
    }
}

impl From<tokio::task::JoinError> for GenerationError {
    fn from(e: tokio::task::JoinError) -> Self {
        GenerationError::Internal(format!("analysis task failed: {}", e))
    }
}
