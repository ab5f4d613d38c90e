//! Client-side failure taxonomy.
//!
//! Every operation that talks to the API or to durable storage returns
//! [`ClientResult`]. None of these errors is fatal: callers render the message
//! and keep whatever data they already had.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid credentials or a missing/revoked token.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Authenticated, but not allowed (admin-only endpoints).
    #[error("access denied: {0}")]
    Forbidden(String),

    /// Rejected locally before any network call.
    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("server error ({status}): {detail}")]
    Server { status: u16, detail: String },

    /// The request never produced an HTTP response (DNS, refused, timeout).
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// Map an HTTP status and server-provided detail to a variant.
    pub fn from_status(status: u16, detail: String) -> Self {
        match status {
            401 => Self::Authentication(detail),
            403 => Self::Forbidden(detail),
            404 => Self::NotFound(detail),
            400 | 422 => Self::Validation(detail),
            _ => Self::Server { status, detail },
        }
    }

    /// Whether the failure means the stored session is no longer usable.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
