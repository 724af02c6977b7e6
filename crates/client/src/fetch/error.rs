//! HTTP fetch error types.

use std::sync::Arc;

use crate::retry::Transient;

/// Errors from the HTTP fetch pipeline.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(Arc<reqwest::Error>),

    /// URL is malformed or uses a scheme that cannot be crawled.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Request timed out.
    #[error("request timeout: {url}")]
    Timeout { url: String },

    /// Connection refused, reset or otherwise interrupted.
    #[error("network error for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: Arc<reqwest::Error>,
    },

    /// Non-success HTTP status.
    #[error("HTTP error: status {status} for {url}")]
    Status { url: String, status: u16 },

    /// Response body exceeded the configured limit.
    #[error("response too large: {url} ({len} bytes exceeds {max})")]
    TooLarge { url: String, len: usize, max: usize },
}

impl FetchError {
    /// Classify a reqwest failure for `url`.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { url: url.to_string() }
        } else {
            FetchError::Network { url: url.to_string(), source: Arc::new(err) }
        }
    }
}

impl Transient for FetchError {
    /// Timeouts, dropped connections, 408, 429 and 5xx are worth another try.
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. } => true,
            FetchError::Network { source, .. } => !source.is_redirect() && !source.is_builder(),
            FetchError::Status { status, .. } => matches!(status, 408 | 429 | 500..=599),
            FetchError::Client(_) | FetchError::InvalidUrl { .. } | FetchError::TooLarge { .. } => false,
        }
    }
}

impl From<FetchError> for docsync_core::Error {
    fn from(err: FetchError) -> Self {
        docsync_core::Error::Retrieval(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> FetchError {
        FetchError::Status { url: "https://example.com/docs/".to_string(), status: code }
    }

    #[test]
    fn test_error_display() {
        let err = status(404);
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("https://example.com/docs/"));
    }

    #[test]
    fn test_transient_statuses() {
        assert!(status(503).is_transient());
        assert!(status(500).is_transient());
        assert!(status(429).is_transient());
        assert!(status(408).is_transient());
        assert!(!status(404).is_transient());
        assert!(!status(401).is_transient());
        assert!(!status(403).is_transient());
    }

    #[test]
    fn test_timeout_is_transient() {
        assert!(FetchError::Timeout { url: "https://example.com/".into() }.is_transient());
    }

    #[test]
    fn test_too_large_is_not_transient() {
        let err = FetchError::TooLarge { url: "https://example.com/".into(), len: 10, max: 5 };
        assert!(!err.is_transient());
    }

    #[test]
    fn test_into_retrieval_error() {
        let err: docsync_core::Error = status(404).into();
        assert!(matches!(err, docsync_core::Error::Retrieval(_)));
        assert_eq!(err.exit_code(), 1);
    }
}
