//! Error types for MetaRetrieval
//!
//! This module defines the error taxonomy used throughout the crate,
//! using `thiserror` for ergonomic error handling. Library functions return
//! [`Result`], an `anyhow` alias; typed failures are raised as
//! [`MetaRetrievalError`] values and can be recovered with
//! `downcast_ref::<MetaRetrievalError>()`.

use thiserror::Error;

/// Main error type for MetaRetrieval operations
///
/// Every failure is scoped to the single turn or repository operation that
/// produced it. None of these variants is fatal to the hosting process.
#[derive(Error, Debug)]
pub enum MetaRetrievalError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested model is not in the model registry
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Caller supplied input that cannot start a turn (blank question, etc.)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing credentials for the completion endpoint
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Connectivity failure or timeout talking to the completion endpoint
    #[error("Transport error after {elapsed_secs:.2}s: {message}")]
    Transport {
        /// Description of the transport failure
        message: String,
        /// Wall-clock seconds spent before the failure
        elapsed_secs: f64,
    },

    /// Completion endpoint answered with a non-success status
    #[error("Endpoint returned status {status} after {elapsed_secs:.2}s: {body}")]
    Endpoint {
        /// HTTP status code
        status: u16,
        /// Response body text, possibly empty
        body: String,
        /// Wall-clock seconds spent on the request
        elapsed_secs: f64,
    },

    /// Completion endpoint answered successfully with an unexpected body
    #[error("Malformed response after {elapsed_secs:.2}s: {message}")]
    MalformedResponse {
        /// What was wrong with the body
        message: String,
        /// Wall-clock seconds spent on the request
        elapsed_secs: f64,
    },

    /// Conversation store read/write failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Message is missing or owned by someone else; the two are deliberately
    /// indistinguishable
    #[error("Message {0} not found")]
    NotFoundOrForbidden(i64),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl MetaRetrievalError {
    /// Elapsed wall-clock time carried by completion endpoint failures
    ///
    /// # Examples
    ///
    /// ```
    /// use metaretrieval::error::MetaRetrievalError;
    ///
    /// let err = MetaRetrievalError::Endpoint {
    ///     status: 500,
    ///     body: String::new(),
    ///     elapsed_secs: 0.25,
    /// };
    /// assert_eq!(err.elapsed_secs(), Some(0.25));
    /// assert_eq!(MetaRetrievalError::Persistence("x".into()).elapsed_secs(), None);
    /// ```
    pub fn elapsed_secs(&self) -> Option<f64> {
        match self {
            Self::Transport { elapsed_secs, .. }
            | Self::Endpoint { elapsed_secs, .. }
            | Self::MalformedResponse { elapsed_secs, .. } => Some(*elapsed_secs),
            _ => None,
        }
    }

    /// Returns true for failures produced by the completion client
    ///
    /// Client failures always imply zero token usage.
    pub fn is_client_error(&self) -> bool {
        self.elapsed_secs().is_some()
    }
}

/// Result type alias for MetaRetrieval operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
