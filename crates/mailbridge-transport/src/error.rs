//! Error types for backend transport operations.

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Failure reaching the backend or decoding its reply.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The configured base URL cannot have path segments appended.
    #[error("Base URL cannot carry a path: {0}")]
    InvalidBase(String),

    /// HTTP request error (connection refused, timeout, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status code.
    #[error("{method} {path} returned {status}: {body}")]
    Status {
        /// Request method.
        method: reqwest::Method,
        /// Request path relative to the base URL.
        path: String,
        /// Response status.
        status: reqwest::StatusCode,
        /// Raw response body, for diagnostics.
        body: String,
    },

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransportError {
    /// Returns the HTTP status if the backend replied with one.
    #[must_use]
    pub const fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
