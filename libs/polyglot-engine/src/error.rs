//! Hard failures of the engine contract.
//!
//! Everything that can go wrong while *running* user code is reported inside
//! an `ExecutionResult`; only malformed submissions and a broken host reach
//! the caller as `EngineError`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("code is required")]
    EmptySource,
    #[error("Unsupported language '{0}'. Supported: python, java, javascript, c, cpp, sql")]
    UnsupportedLanguage(String),
    #[error("Source code exceeds maximum size of {limit} bytes")]
    SourceTooLarge { limit: usize },
    #[error("Input exceeds maximum size of {limit} bytes")]
    InputTooLarge { limit: usize },
    #[error("Failed to prepare workspace: {0}")]
    Workspace(#[from] std::io::Error),
}

impl EngineError {
    /// True for errors caused by the submission rather than the host
    pub fn is_client_error(&self) -> bool {
        !matches!(self, EngineError::Workspace(_))
    }
}

/// Failures talking to the remote execution service
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("remote execution timed out")]
    Timeout,
    #[error("remote execution service returned HTTP {0}")]
    Status(u16),
    #[error("remote execution service unreachable: {0}")]
    Transport(String),
    #[error("malformed response from remote execution service: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout
        } else if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            RemoteError::Status(status.as_u16())
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

/// Failures of the judgement service; always recovered by the fallback verdict
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("judgement service not configured")]
    NotConfigured,
    #[error("judgement request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("judgement service returned HTTP {0}")]
    Status(u16),
    #[error("malformed judgement: {0}")]
    Malformed(String),
}

/// A SQL statement refused by the safety filter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsafe SQL operation detected: {keyword}")]
pub struct SqlRejection {
    pub keyword: String,
}
