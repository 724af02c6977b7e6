//! HTTP fetch pipeline with robots.txt compliance.
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//!
//! ### Conditional Requests
//! - Stored `ETag`/`Last-Modified` validators are sent back as
//!   `If-None-Match`/`If-Modified-Since`; a `304` yields [`Fetched::NotModified`].

pub mod error;
pub mod robots;

use bytes::Bytes;
use reqwest::Url;
use reqwest::{Client, StatusCode, header};
use std::sync::Arc;
use std::time::{Duration, Instant};

use docsync_core::AppConfig;

pub use error::FetchError;
pub use robots::RobotsCache;

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "docsync/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Whether to respect robots.txt (default: true)
    pub respect_robots: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "docsync/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            respect_robots: true,
        }
    }
}

impl FetchConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            respect_robots: config.respect_robots,
            ..Self::default()
        }
    }
}

/// Cache validators remembered from an earlier response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl Validators {
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Validators for the next conditional request
    pub validators: Validators,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Whether the body is an HTML document.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|mime| {
                let mime = mime.trim();
                mime.eq_ignore_ascii_case("text/html") || mime.eq_ignore_ascii_case("application/xhtml+xml")
            })
            .unwrap_or(false)
    }
}

/// Outcome of a possibly conditional GET.
#[derive(Debug, Clone)]
pub enum Fetched {
    Modified(FetchResponse),
    /// The server confirmed the stored copy is current.
    NotModified,
}

/// HTTP fetch client with byte limits and robots.txt checks.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
    robots_cache: RobotsCache,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| FetchError::Client(Arc::new(e)))?;

        let robots_cache = RobotsCache::new(config.user_agent.clone(), http.clone());

        Ok(Self { http, config, robots_cache })
    }

    /// Whether robots.txt lets us fetch `url`. Always true when robots are ignored.
    pub async fn allowed(&self, url: &Url) -> bool {
        if !self.config.respect_robots {
            return true;
        }
        self.robots_cache.is_allowed(url).await
    }

    /// Fetch a URL, returning raw bytes and metadata.
    ///
    /// With `validators`, the request is conditional and an unchanged
    /// resource comes back as [`Fetched::NotModified`].
    pub async fn fetch(&self, url: &Url, validators: Option<&Validators>) -> Result<Fetched, FetchError> {
        let start = Instant::now();

        let mut request = self.http.get(url.as_str()).header(
            header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        );
        if let Some(v) = validators {
            if let Some(etag) = &v.etag {
                request = request.header(header::IF_NONE_MATCH, etag);
            }
            if let Some(date) = &v.last_modified {
                request = request.header(header::IF_MODIFIED_SINCE, date);
            }
        }

        let response = request.send().await.map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

        let status = response.status();

        if status == StatusCode::NOT_MODIFIED && validators.is_some_and(|v| !v.is_empty()) {
            tracing::debug!("{} not modified", url);
            return Ok(Fetched::NotModified);
        }

        if !status.is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() });
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(FetchError::TooLarge { url: url.to_string(), len: len as usize, max: self.config.max_bytes });
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let bytes = response.bytes().await.map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

        if bytes.len() > self.config.max_bytes {
            return Err(FetchError::TooLarge { url: url.to_string(), len: bytes.len(), max: self.config.max_bytes });
        }

        let header_value = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };

        let content_type = header_value(header::CONTENT_TYPE);
        let validators = Validators { etag: header_value(header::ETAG), last_modified: header_value(header::LAST_MODIFIED) };

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} -> {} in {}ms ({} bytes)",
            url,
            final_url,
            fetch_ms,
            bytes.len()
        );

        Ok(Fetched::Modified(FetchResponse {
            url: url.clone(),
            final_url,
            status,
            content_type,
            bytes,
            validators,
            fetch_ms,
        }))
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}
