//! Error types for fmsql.

use thiserror::Error;

/// The main error type for fmsql operations.
#[derive(Debug, Error)]
pub enum FmError {
    /// Session acquisition or refresh failed.
    #[error("Authentication failed ({code}): {message}")]
    Authentication { message: String, code: i64 },

    /// The Data API rejected the request, or no response was received.
    #[error("FileMaker error {code}: {message}")]
    Api { message: String, code: i64 },

    /// Statement type (or feature) the Data API cannot express.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Record lookup for UPDATE/DELETE returned nothing.
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Failed to parse the SQL statement.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Fewer parameters bound than the statement has placeholders.
    #[error("Parameter {index} is not bound ({bound} bound)")]
    MissingParam { index: usize, bound: usize },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FmError {
    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create an application-level error carrying the remote code.
    pub fn api(message: impl Into<String>, code: i64) -> Self {
        Self::Api {
            message: message.into(),
            code,
        }
    }

    /// Create an authentication error carrying the remote code.
    pub fn auth(message: impl Into<String>, code: i64) -> Self {
        Self::Authentication {
            message: message.into(),
            code,
        }
    }

    /// Remote status or application code, when the error carries one.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Authentication { code, .. } | Self::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type alias for fmsql operations.
pub type FmResult<T> = Result<T, FmError>;
