//! robots.txt compliance, cached per origin for the lifetime of a crawl.

use robotstxt_rs::RobotsTxt;
use std::collections::HashMap;
use tokio::sync::RwLock;
use url::Url;

/// Maximum size of robots.txt to fetch (1MB).
const MAX_ROBOTS_SIZE: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
enum RobotsError {
    #[error("failed to fetch robots.txt: {0}")]
    Fetch(String),

    #[error("robots.txt too large")]
    TooLarge,
}

/// Per-origin robots.txt rules.
pub struct RobotsCache {
    cache: RwLock<HashMap<String, RobotsTxt>>,
    user_agent: String,
    http: reqwest::Client,
}

impl RobotsCache {
    pub fn new(user_agent: String, http: reqwest::Client) -> Self {
        Self { cache: RwLock::new(HashMap::new()), user_agent, http }
    }

    /// Check if a URL is allowed by its origin's robots.txt.
    ///
    /// A robots.txt that cannot be fetched allows everything.
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let robots_url = robots_url(url);

        {
            let cache = self.cache.read().await;
            if let Some(robots) = cache.get(&robots_url) {
                return robots.can_fetch(&self.user_agent, &request_path(url));
            }
        }

        let robots = match self.fetch_robots(&robots_url).await {
            Ok(robots) => robots,
            Err(e) => {
                tracing::warn!("{} unavailable ({}), allowing all", robots_url, e);
                RobotsTxt::parse("")
            }
        };

        let allowed = robots.can_fetch(&self.user_agent, &request_path(url));
        self.cache.write().await.insert(robots_url, robots);

        if !allowed {
            tracing::debug!("robots.txt disallows {}", url);
        }
        allowed
    }

    async fn fetch_robots(&self, url: &str) -> Result<RobotsTxt, RobotsError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RobotsError::Fetch(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            if let Some(len) = response.content_length()
                && len as usize > MAX_ROBOTS_SIZE
            {
                return Err(RobotsError::TooLarge);
            }

            let bytes = response.bytes().await.map_err(|e| RobotsError::Fetch(e.to_string()))?;

            if bytes.len() > MAX_ROBOTS_SIZE {
                return Err(RobotsError::TooLarge);
            }

            Ok(RobotsTxt::parse(&String::from_utf8_lossy(&bytes)))
        } else if status.is_client_error() {
            tracing::debug!("robots.txt not found for {}, allowing all", url);
            Ok(RobotsTxt::parse(""))
        } else {
            Err(RobotsError::Fetch(format!("status {}", status)))
        }
    }
}

fn robots_url(url: &Url) -> String {
    match url.port() {
        Some(port) => format!("{}://{}:{}/robots.txt", url.scheme(), url.host_str().unwrap_or(""), port),
        None => format!("{}://{}/robots.txt", url.scheme(), url.host_str().unwrap_or("")),
    }
}

/// Path and query, the part of a URL robots.txt rules match against.
fn request_path(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robots_url_keeps_port() {
        let url = Url::parse("http://127.0.0.1:8080/docs/page").unwrap();
        assert_eq!(robots_url(&url), "http://127.0.0.1:8080/robots.txt");

        let url = Url::parse("https://example.com/docs/").unwrap();
        assert_eq!(robots_url(&url), "https://example.com/robots.txt");
    }

    #[tokio::test]
    async fn test_cached_rules_applied() {
        let cache = RobotsCache::new("docsync/0.1".to_string(), reqwest::Client::new());
        cache.cache.write().await.insert(
            "https://example.com/robots.txt".to_string(),
            RobotsTxt::parse("User-agent: *\nDisallow: /private/"),
        );

        assert!(cache.is_allowed(&Url::parse("https://example.com/docs/").unwrap()).await);
        assert!(!cache.is_allowed(&Url::parse("https://example.com/private/x").unwrap()).await);
    }

    #[tokio::test]
    async fn test_unreachable_robots_allows() {
        let cache = RobotsCache::new("docsync/0.1".to_string(), reqwest::Client::new());
        // Port 9 (discard) is not listening; the fetch fails quickly.
        assert!(cache.is_allowed(&Url::parse("http://127.0.0.1:9/docs/").unwrap()).await);
    }
}
