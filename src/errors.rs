use thiserror::Error;

/// Errors that can occur while dispatching queries or building reports.
#[derive(Error, Debug)]
pub enum CieError {
    /// The call could not complete: connection failure, timeout or cancellation.
    #[error("query failed: {message}")]
    Transport { message: String },

    /// The query endpoint answered with a non-success status.
    #[error("query error (status {status}): {body}")]
    HttpStatus { status: u16, body: String },

    /// The response body could not be decoded into a tabular result.
    #[error("parse response: {message}")]
    Decode { message: String },

    /// The embedded fact store reported a fault.
    #[error("embedded query: {message}")]
    Backend { message: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CieError {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub(crate) fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Returns the HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Convenience alias for results using `CieError`.
pub type Result<T> = std::result::Result<T, CieError>;
