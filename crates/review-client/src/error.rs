//! Gateway error handling
//!
//! Every failure of a backend call falls into one of four kinds: the
//! transport failed, the server answered with a non-success status, the
//! body did not have the expected shape, or the target record is gone.

use thiserror::Error;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by a [`crate::TestCaseGateway`]
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Transport or connection failure
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Non-success status from a reachable server
    #[error("Server returned {status}: {body}")]
    Server { status: u16, body: String },

    /// Response body does not match the expected shape
    #[error("Decode error: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Update or delete target absent server-side
    #[error("Test case not found: {id}")]
    NotFound { id: i64 },

    /// The configured base URL cannot address the backend
    #[error("Invalid backend URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

impl GatewayError {
    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new network error with source
    pub fn network_with_source<S: Into<String>, E: Into<BoxError>>(message: S, source: E) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new server error
    pub fn server<S: Into<String>>(status: u16, body: S) -> Self {
        Self::Server {
            status,
            body: body.into(),
        }
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::Decode {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new decode error with source
    pub fn decode_with_source<S: Into<String>, E: Into<BoxError>>(message: S, source: E) -> Self {
        Self::Decode {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new not found error
    pub fn not_found(id: i64) -> Self {
        Self::NotFound { id }
    }

    /// Create a new invalid URL error
    pub fn invalid_url<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Whether repeating the same user action may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Server { status, .. } => *status >= 500,
            Self::Decode { .. } => false,
            Self::NotFound { .. } => false,
            Self::InvalidUrl { .. } => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound { .. } => ErrorSeverity::Warning,
            Self::Network { .. } => ErrorSeverity::Error,
            Self::Server { .. } => ErrorSeverity::Error,
            Self::Decode { .. } => ErrorSeverity::Error,
            Self::InvalidUrl { .. } => ErrorSeverity::Critical,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Network { message, .. } => {
                format!("Could not reach the evaluation backend: {message}")
            }
            Self::Server { status, .. } => {
                format!("The evaluation backend rejected the request (status {status})")
            }
            Self::Decode { message, .. } => {
                format!("The evaluation backend sent an unexpected response: {message}")
            }
            Self::NotFound { id } => format!("Test case {id} no longer exists"),
            Self::InvalidUrl { url, .. } => format!("'{url}' is not a usable backend URL"),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Warning message
    Warning,
    /// Error message
    Error,
    /// Critical error
    Critical,
}

impl ErrorSeverity {
    /// Get the log level for this severity
    pub fn log_level(&self) -> tracing::Level {
        match self {
            Self::Warning => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
            Self::Critical => tracing::Level::ERROR,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::decode_with_source("response body could not be decoded", err)
        } else {
            Self::network_with_source(err.to_string(), err)
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode_with_source(err.to_string(), err)
    }
}
