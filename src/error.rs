// src/error.rs

//! Unified error handling for the poster pipeline.

use std::fmt;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// The poster store could not be read or is corrupt
    #[error("Store unavailable at {path}: {reason}")]
    StoreUnavailable { path: String, reason: String },

    /// No poster passed moderation, nothing can be published
    #[error("No eligible posters to publish")]
    NoEligibleRecords,

    /// A catalog page could not be fetched
    #[error("Fetch error for {url}: {message}")]
    Fetch { url: String, message: String },

    /// The classifier asked us to slow down
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The classifier failed for a reason other than rate limiting
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// Media upload or status creation failed
    #[error("Publish error: {0}")]
    Publish(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a store error for the given backing path.
    pub fn store_unavailable(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::StoreUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a fetch error with the failing URL.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a classifier error.
    pub fn classifier(message: impl fmt::Display) -> Self {
        Self::Classifier(message.to_string())
    }

    /// Create a publish error.
    pub fn publish(message: impl fmt::Display) -> Self {
        Self::Publish(message.to_string())
    }

    /// Whether this error should trigger the long rate-limit backoff.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}
