//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (DOCSYNC_*)
//! 2. TOML config file (`DOCSYNC_CONFIG_FILE`, else `./docsync.toml`)
//! 3. Built-in defaults

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod source;
mod validation;

pub use source::{SourceConfig, SourceKind};
pub use validation::ConfigError;

/// Config file consulted when `DOCSYNC_CONFIG_FILE` is not set.
const DEFAULT_CONFIG_FILE: &str = "docsync.toml";

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (DOCSYNC_*)
/// 2. TOML config file
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory that holds one store per source unless a source sets `path`.
    ///
    /// Set via DOCSYNC_CACHE_DIR environment variable.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via DOCSYNC_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via DOCSYNC_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via DOCSYNC_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra attempts after a transient network failure.
    ///
    /// Set via DOCSYNC_RETRIES environment variable.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Pause between attempts in milliseconds.
    ///
    /// Set via DOCSYNC_RETRY_DELAY_MS environment variable.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Whether the page crawler respects robots.txt rules.
    ///
    /// Set via DOCSYNC_RESPECT_ROBOTS environment variable.
    #[serde(default = "default_true")]
    pub respect_robots: bool,

    /// Upper bound on pages fetched by a single crawl.
    ///
    /// Set via DOCSYNC_MAX_PAGES environment variable.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Documentation sources keyed by the name used on the command line.
    #[serde(default = "default_sources")]
    pub sources: BTreeMap<String, SourceConfig>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("references")
}

fn default_user_agent() -> String {
    "docsync/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_max_pages() -> usize {
    500
}

fn default_sources() -> BTreeMap<String, SourceConfig> {
    BTreeMap::from([
        (
            "opencode".to_string(),
            SourceConfig {
                dir: Some("opencode-docs".into()),
                ..SourceConfig::pages("https://opencode.ai/docs/")
            },
        ),
        (
            "tmux".to_string(),
            SourceConfig { dir: Some("tmux-wiki".into()), ..SourceConfig::git("https://github.com/tmux/tmux.wiki.git") },
        ),
    ])
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            respect_robots: true,
            max_pages: default_max_pages(),
            sources: default_sources(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Pause between retry attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `DOCSYNC_`
    /// 2. TOML file from `DOCSYNC_CONFIG_FILE`, or `docsync.toml` if present
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be parsed
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("DOCSYNC_CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(&config_path))
            .merge(
                Env::prefixed("DOCSYNC_")
                    .ignore(&["CONFIG_FILE"])
                    .map(|key| key.as_str().to_lowercase().into())
                    .split("__"),
            );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Look up a configured source by name.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownSource` if no source has that name.
    pub fn source(&self, name: &str) -> Result<&SourceConfig, ConfigError> {
        self.sources.get(name).ok_or_else(|| ConfigError::UnknownSource(name.to_string()))
    }

    /// Store root for a named source.
    ///
    /// An explicit `path` wins, otherwise the store lives at
    /// `cache_dir/<dir or name>`.
    pub fn store_root(&self, name: &str, source: &SourceConfig) -> PathBuf {
        match &source.path {
            Some(path) => path.clone(),
            None => self.cache_dir.join(source.dir.as_deref().unwrap_or(name)),
        }
    }
}
