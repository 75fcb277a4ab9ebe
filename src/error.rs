//! Error types for Scholar.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unknown provider config: {0}")]
    UnknownConfig(String),
}

/// Local persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported archive version {found} (expected {expected})")]
    ArchiveVersion { found: u32, expected: u32 },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("No API key configured for {config}")]
    MissingApiKey { config: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Chat-session and state errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No active session. Use /new or /switch first")]
    NoActiveSession,

    #[error("Session {0} not found")]
    NotFound(String),

    #[error("No quiz selected")]
    NoQuiz,

    #[error("No mind map selected")]
    NoMindMap,

    #[error("Question {index} out of range (quiz has {count})")]
    QuestionOutOfRange { index: usize, count: usize },

    #[error("Quiz {0} was already submitted")]
    QuizAlreadySubmitted(String),

    #[error("Nothing to resend in this session")]
    NothingToResend,

    #[error("Invalid attachment {path}: {reason}")]
    InvalidAttachment { path: String, reason: String },
}

/// Access-gate errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Incorrect password")]
    WrongPassword,

    #[error("Could not record access marker: {0}")]
    Marker(#[from] std::io::Error),
}

/// Result type alias for the client.
pub type Result<T> = std::result::Result<T, Error>;
