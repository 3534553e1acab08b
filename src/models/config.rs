//! Application configuration structures.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Store and checkpoint file names
    #[serde(default)]
    pub store: StoreConfig,

    /// Catalog crawling behavior
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Moderation classifier settings
    #[serde(default)]
    pub moderation: ModerationConfig,

    /// Publishing target settings
    #[serde(default)]
    pub publisher: PublisherConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.store.posters_file.trim().is_empty() {
            return Err(AppError::validation("store.posters_file is empty"));
        }
        if self.store.checkpoint_file.trim().is_empty() {
            return Err(AppError::validation("store.checkpoint_file is empty"));
        }
        if self.store.posters_file == self.store.checkpoint_file {
            return Err(AppError::validation(
                "store.posters_file and store.checkpoint_file must differ",
            ));
        }
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.page_size == 0 {
            return Err(AppError::validation("crawler.page_size must be > 0"));
        }
        self.crawler.first_page_url()?;
        Url::parse(&self.moderation.endpoint)?;
        if self.moderation.model.trim().is_empty() {
            return Err(AppError::validation("moderation.model is empty"));
        }
        Url::parse(&self.publisher.instance_url)?;
        Ok(())
    }
}

/// Resolve a secret from the environment variable named in the config.
pub fn secret_from_env(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::config(format!(
            "environment variable {var} is not set"
        ))),
    }
}

/// Store file names, relative to the storage directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "defaults::posters_file")]
    pub posters_file: String,

    #[serde(default = "defaults::checkpoint_file")]
    pub checkpoint_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            posters_file: defaults::posters_file(),
            checkpoint_file: defaults::checkpoint_file(),
        }
    }
}

/// Catalog crawling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Catalog search endpoint
    #[serde(default = "defaults::catalog_url")]
    pub catalog_url: String,

    /// Free-text search query
    #[serde(default = "defaults::query")]
    pub query: String,

    /// Results per page
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// Explicit first page, overriding the computed one
    #[serde(default)]
    pub start_url: Option<String>,

    /// Delay before retrying a failed page, in seconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_secs: u64,
}

impl CrawlerConfig {
    /// First catalog page: unrestricted images, sorted by title.
    pub fn first_page_url(&self) -> Result<String> {
        if let Some(start) = self.start_url.as_deref().filter(|s| !s.trim().is_empty()) {
            return Ok(Url::parse(start)?.to_string());
        }

        let page_size = self.page_size.to_string();
        let url = Url::parse_with_params(
            &self.catalog_url,
            &[
                ("fa", "access-restricted:false|online-format:image"),
                ("fo", "json"),
                ("q", self.query.as_str()),
                ("sb", "title_s"),
                ("c", page_size.as_str()),
            ],
        )?;
        Ok(url.to_string())
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            catalog_url: defaults::catalog_url(),
            query: defaults::query(),
            page_size: defaults::page_size(),
            start_url: None,
            retry_delay_secs: defaults::retry_delay(),
        }
    }
}

/// Moderation classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Generative API base URL
    #[serde(default = "defaults::moderation_endpoint")]
    pub endpoint: String,

    #[serde(default = "defaults::moderation_model")]
    pub model: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "defaults::moderation_key_env")]
    pub api_key_env: String,

    /// Wait after a rate-limit response, in seconds
    #[serde(default = "defaults::rate_limit_backoff")]
    pub rate_limit_backoff_secs: u64,

    /// Pause between successful classifications, in milliseconds
    #[serde(default = "defaults::moderation_delay")]
    pub request_delay_ms: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::moderation_endpoint(),
            model: defaults::moderation_model(),
            api_key_env: defaults::moderation_key_env(),
            rate_limit_backoff_secs: defaults::rate_limit_backoff(),
            request_delay_ms: defaults::moderation_delay(),
        }
    }
}

/// Status visibility on the publishing instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Unlisted => "unlisted",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishing target settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Base URL of the Mastodon-compatible instance
    #[serde(default = "defaults::instance_url")]
    pub instance_url: String,

    /// Name of the environment variable holding the access token
    #[serde(default = "defaults::access_token_env")]
    pub access_token_env: String,

    #[serde(default)]
    pub visibility: Visibility,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            instance_url: defaults::instance_url(),
            access_token_env: defaults::access_token_env(),
            visibility: Visibility::default(),
        }
    }
}

mod defaults {
    // Store defaults
    pub fn posters_file() -> String {
        "posters_database.json".into()
    }
    pub fn checkpoint_file() -> String {
        "checkpoint.json".into()
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; posterbot/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn catalog_url() -> String {
        "https://www.loc.gov/photos/".into()
    }
    pub fn query() -> String {
        "poster".into()
    }
    pub fn page_size() -> u32 {
        100
    }
    pub fn retry_delay() -> u64 {
        60
    }

    // Moderation defaults
    pub fn moderation_endpoint() -> String {
        "https://generativelanguage.googleapis.com/v1beta".into()
    }
    pub fn moderation_model() -> String {
        "gemini-1.5-flash".into()
    }
    pub fn moderation_key_env() -> String {
        "GEMINI_API_KEY".into()
    }
    pub fn rate_limit_backoff() -> u64 {
        60
    }
    pub fn moderation_delay() -> u64 {
        1000
    }

    // Publisher defaults
    pub fn instance_url() -> String {
        "https://mastodon.social".into()
    }
    pub fn access_token_env() -> String {
        "MASTODON_ACCESS_TOKEN".into()
    }
}
