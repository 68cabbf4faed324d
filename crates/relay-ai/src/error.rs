//! Error types for relay-ai

use thiserror::Error;

/// Result type alias using relay-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the assistant service
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response
    #[error("API error: {message} (type: {error_type})")]
    Api { error_type: String, message: String },

    /// Authentication failed (401/403)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The referenced remote resource does not exist (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded
    #[error("Rate limited: retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Invalid API key
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// Unexpected response format
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Create an API error from type and message
    pub fn api(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Check if this error is transient and the request may be repeated
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::RateLimited { .. } => true,
            Error::Api {
                error_type,
                message,
            } => {
                let et = error_type.to_lowercase();
                let msg = message.to_lowercase();
                et.contains("server_error")
                    || et.contains("rate_limit")
                    || et.contains("overloaded")
                    || msg.contains("rate limit")
                    || msg.contains("overloaded")
                    || msg.contains("try again")
                    || msg.contains("502")
                    || msg.contains("503")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_rate_limited() {
        assert!(Error::RateLimited { retry_after: Some(2) }.is_retryable());
        assert!(Error::RateLimited { retry_after: None }.is_retryable());
    }

    #[test]
    fn test_retryable_server_error_type() {
        let e = Error::api("server_error", "The server had an error processing your request");
        assert!(e.is_retryable());
    }

    #[test]
    fn test_retryable_try_again_message() {
        let e = Error::api("error", "Something went wrong, please try again later");
        assert!(e.is_retryable());
    }

    #[test]
    fn test_not_retryable_invalid_request() {
        let e = Error::api("invalid_request_error", "No thread found with id 'thread_x'");
        assert!(!e.is_retryable());
    }

    #[test]
    fn test_not_retryable_typed_variants() {
        assert!(!Error::InvalidApiKey.is_retryable());
        assert!(!Error::Auth("bad key".into()).is_retryable());
        assert!(!Error::NotFound("run_1".into()).is_retryable());
        assert!(!Error::UnexpectedResponse("empty".into()).is_retryable());
    }

    #[test]
    fn test_display_api_error() {
        let e = Error::api("invalid_request_error", "bad thread");
        assert_eq!(
            e.to_string(),
            "API error: bad thread (type: invalid_request_error)"
        );
    }
}
