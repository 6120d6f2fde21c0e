//! Error types for AskData.
//!
//! Library crates use [`AskDataError`] via `thiserror`.
//! The server binary wraps this with `color-eyre` for startup diagnostics.

use std::path::PathBuf;

/// Top-level error type for all AskData operations.
#[derive(Debug, thiserror::Error)]
pub enum AskDataError {
    /// Configuration loading or validation error (startup-time, fatal).
    #[error("config error: {message}")]
    Config { message: String },

    /// The relational store could not be reached or introspected.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Any other database-layer failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Transport or API failure talking to the text-generation service.
    #[error("generation error: {0}")]
    Generation(String),

    /// No usable query could be synthesized from the question.
    #[error("query synthesis failed: {message}")]
    Synthesis { message: String },

    /// The candidate query was rejected or failed inside the store.
    #[error("SQL execution error: {message}")]
    Execution { message: String },

    /// An outbound call exceeded its time budget.
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    /// Chart rendering failed.
    #[error("render error: {0}")]
    Render(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid caller input.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AskDataError>;

impl AskDataError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis {
            message: msg.into(),
        }
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable machine-readable name of the variant, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "ConfigurationError",
            Self::StoreUnavailable(_) => "StoreUnavailable",
            Self::Storage(_) => "StorageError",
            Self::Generation(_) => "GenerationError",
            Self::Synthesis { .. } => "SynthesisFailure",
            Self::Execution { .. } => "ExecutionFailure",
            Self::Timeout { .. } => "Timeout",
            Self::Render(_) => "RenderError",
            Self::Io { .. } => "IoError",
            Self::Validation { .. } => "ValidationError",
        }
    }
}
