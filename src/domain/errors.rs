// src/domain/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Unknown(s)
    }
}

/// Failure of a single call against one backend source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Transport unreachable, connection reset or request timed out
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// The service answered with a non-success status code
    #[error("Service unavailable: HTTP {status}")]
    ServiceUnavailable { status: u16 },

    /// Response body did not match the expected shape
    #[error("Parse failure: {0}")]
    ParseFailure(String),
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::ParseFailure(e.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Gave up after {attempts} consecutive connection failures")]
    Exhausted { attempts: u32 },
}

// Result type aliases for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type SourceResult<T> = Result<T, SourceError>;
