//! Live alerts error types.

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while talking to an event source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The source could not be reached or answered with garbage.
    #[error("Connectivity fault: {0}")]
    Connectivity(String),

    /// The source rejected our credentials.
    #[error("Auth fault: {0}")]
    Auth(String),

    /// The live session used to scope rants is gone.
    #[error("Session ended: {0}")]
    SessionEnded(String),
}

impl SourceError {
    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::Connectivity(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Whether this error means "skip this tick and try again later".
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Connectivity(_) | Self::Auth(_))
    }
}

/// Errors that can occur while configuring or running the alert system.
#[derive(Error, Debug)]
pub enum Error {
    /// Event source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Invalid configuration; polling stays disabled until corrected
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
