//! Failures of a single chat-completions attempt.

use thiserror::Error;

/// One failed attempt against the model endpoint.
///
/// The analyzer retries every variant alike; `code()` only labels the
/// failure in usage records.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Endpoint answered with a non-success status.
    #[error("model endpoint returned HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        /// Error code from the reply body, e.g. "rate_limit_exceeded".
        provider_code: Option<String>,
        /// Value of the `x-request-id` header.
        request_id: Option<String>,
    },

    /// Prompt or reply exceeded its size cap.
    #[error("{what} too large: {len} (max {max})")]
    TooLarge {
        what: &'static str,
        len: usize,
        max: usize,
    },

    /// Successful status, but the completion envelope was unusable.
    #[error("malformed completion: {0}")]
    Malformed(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Missing API key, bad header value and the like.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Short label for usage records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Status { status: 429, .. } => "rate_limited",
            Self::Status { status, .. } if *status >= 500 => "server_error",
            Self::Status { .. } => "rejected",
            Self::TooLarge { .. } => "too_large",
            Self::Malformed(_) => "malformed_reply",
            Self::Http(e) if e.is_timeout() => "timeout",
            Self::Http(_) => "http_error",
            Self::Config(_) => "config_error",
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Status { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }
}
