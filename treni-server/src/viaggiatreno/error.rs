//! ViaggiaTreno client error types.

/// Errors from the upstream transit API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// HTTP request failed (network error, connect failure, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an unexpected status code
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be decoded
    #[error("decode error: {message}")]
    Decode { message: String },

    /// Rate limited by the API
    #[error("rate limited by ViaggiaTreno")]
    RateLimited,

    /// The request did not complete before its deadline
    #[error("request timed out")]
    Timeout,

    /// Client is not configured for this operation
    #[error("not configured: {0}")]
    NotConfigured(String),
}

impl ApiError {
    /// Whether this is a network-level failure rather than an API answer.
    pub fn is_transport(&self) -> bool {
        match self {
            ApiError::Http(_) | ApiError::Timeout => true,
            ApiError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
