//! Normalized gateway errors
//!
//! Whatever the transport throws, callers see exactly one shape: a
//! network failure, an HTTP failure with status and server message, or a
//! malformed call rejected before dispatch. Errors are `Clone` because a
//! single refresh failure fans out to every request parked behind it.

use serde_json::Value;

use crate::transport::TransportError;

/// The only error shape `Gateway::send` callers ever see.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// No response was received from the portal API.
    #[error("network error: {0}")]
    Network(String),

    /// The portal API answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        details: Option<Value>,
    },

    /// The call was malformed and rejected before dispatch.
    #[error("invalid request: {0}")]
    Request(String),
}

/// Result alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status code, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(message) => Error::Network(message),
            TransportError::Status { status, body } => {
                let message = body
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .unwrap_or_else(|| default_message(status));
                let details = match body {
                    Value::Null => None,
                    other => Some(other),
                };
                Error::Http {
                    status,
                    message,
                    details,
                }
            }
        }
    }
}

/// Fallback message when the server body carries none.
fn default_message(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("HTTP {status}"))
}
