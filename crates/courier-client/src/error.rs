//! Error types for courier calls.
//!
//! Every failure a caller can observe is classified by [`ErrorKind`]; the
//! retry policy consults [`Error::is_retryable`] and nothing else.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Result type for courier operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or inconsistent contract/client configuration.
    Configuration,
    /// An argument failed validation before any I/O.
    Validation,
    /// I/O failure or retryable HTTP status.
    Transient,
    /// The remote side answered with a well-formed failure.
    Remote,
    /// A payload could not be encoded or decoded.
    Serialization,
    /// The call's overall deadline elapsed.
    Timeout,
    /// The retry budget was consumed.
    Exhausted,
    /// The client has been shut down.
    Lifecycle,
    /// Anything else.
    Internal,
}

/// Error type for courier operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Contract or client configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// An argument failed validation.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// Failed to reach the remote endpoint or read its response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a retryable HTTP status.
    #[error("service unavailable (HTTP {status}): {message}")]
    Unavailable {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The remote side reported a business failure.
    #[error("remote error [{code}]: {message}")]
    Remote {
        /// Error code from the remote side.
        code: String,
        /// Error message from the remote side.
        message: String,
        /// Optional additional data.
        data: Option<Value>,
    },

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The call did not complete within its deadline.
    #[error("call to {service}#{method} timed out after {}ms", .timeout.as_millis())]
    Timeout {
        /// Service id of the call.
        service: String,
        /// Remote method name of the call.
        method: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// Every attempt failed with a retryable error.
    #[error("call to {service}#{method} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Service id of the call.
        service: String,
        /// Remote method name of the call.
        method: String,
        /// Attempts made, including the first.
        attempts: u32,
        /// The last failure.
        #[source]
        source: Box<Error>,
    },

    /// The client was shut down and cannot serve calls.
    #[error("client is shut down")]
    Shutdown,

    /// The transport does not implement the requested call shape.
    #[error("operation not supported by this transport: {0}")]
    Unsupported(String),

    /// Internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a remote business error.
    pub fn remote(code: impl Into<String>, message: impl Into<String>, data: Option<Value>) -> Self {
        Self::Remote {
            code: code.into(),
            message: message.into(),
            data,
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Unsupported(_) => ErrorKind::Configuration,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Transport(_) | Self::Unavailable { .. } => ErrorKind::Transient,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::RetriesExhausted { .. } => ErrorKind::Exhausted,
            Self::Shutdown => ErrorKind::Lifecycle,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if another attempt may succeed.
    ///
    /// Only transport failures and retryable HTTP statuses qualify.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Returns true if a configured fallback may replace this error.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transient | ErrorKind::Timeout | ErrorKind::Exhausted
        )
    }

    /// The innermost cause, looking through exhausted-retry wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::RetriesExhausted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Transport(format!("request timed out: {}", err))
        } else if err.is_connect() {
            Error::Transport(format!("connection failed: {}", err))
        } else if err.is_builder() {
            Error::Config(format!("invalid request: {}", err))
        } else {
            Error::Transport(err.to_string())
        }
    }
}

impl From<courier_config::ConfigError> for Error {
    fn from(err: courier_config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Config(format!("invalid URL: {}", err))
    }
}
