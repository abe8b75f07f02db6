use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error codes shared by every layer of the pipeline.
pub mod codes {
    /// Malformed corpus; fatal at index build time only.
    pub const CORPUS_INVALID: &str = "CORPUS_INVALID";
    /// Missing, corrupt or out-of-lockstep index.
    pub const INDEX_UNAVAILABLE: &str = "INDEX_UNAVAILABLE";
    /// Inference endpoint unreachable, rate limited or returning garbage.
    pub const MODEL_UNAVAILABLE: &str = "MODEL_UNAVAILABLE";
    pub const REVIEW_EXHAUSTED: &str = "REVIEW_EXHAUSTED";
    pub const ARTICLE_NOT_FOUND: &str = "ARTICLE_NOT_FOUND";
    pub const MEMORY_WRITE_FAILED: &str = "MEMORY_WRITE_FAILED";
    pub const MEMORY_READ_FAILED: &str = "MEMORY_READ_FAILED";
    pub const REQUEST_CANCELLED: &str = "REQUEST_CANCELLED";
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
}

/// Single structured error shape used across the core, the pipeline and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }

    pub fn cancelled() -> Self {
        Self::new(codes::REQUEST_CANCELLED, "Request was cancelled")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(d) => write!(f, "[{}] {} ({d})", self.code, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

impl std::error::Error for AppError {}
