// Error types shared by the library modules. Command handlers wrap these in
// `anyhow::Error` at the CLI boundary; keeping them typed here lets tests
// match on the exact failure.

use thiserror::Error;

/// Failure of a call against the annotation service.
///
/// A 404 is not an error: accessors report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("token cannot be sent as a header: {0}")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),
}

impl ApiError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Http(e) => e.status().map(|s| s.as_u16()),
            ApiError::Decode(_) | ApiError::InvalidToken(_) => None,
        }
    }
}

/// A resource path that matches none of the known layouts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Cannot parse Resource identifier {0}")]
    Unrecognized(String),
}
