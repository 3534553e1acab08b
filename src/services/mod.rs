//! External collaborators of the pipeline.
//!
//! Each collaborator is a trait so the pipeline can run against fakes in
//! tests; the HTTP-backed implementations live in the submodules:
//! - Catalog paging (`LocCatalogFetcher`)
//! - Moderation (`GeminiClassifier`)
//! - Publishing (`MastodonPublisher`)
//! - Image download (`HttpMediaSource`)

mod catalog;
mod classifier;
mod mastodon;
mod media;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CatalogPage, Poster, Verdict, Visibility};

pub use catalog::LocCatalogFetcher;
pub use classifier::GeminiClassifier;
pub use mastodon::MastodonPublisher;
pub use media::HttpMediaSource;

/// Source of catalog pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page. Any error is treated as transient by the crawler.
    async fn fetch(&self, url: &str) -> Result<CatalogPage>;
}

/// Content moderation verdicts.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a poster. Fails with `AppError::RateLimited` when the caller
    /// should back off, `AppError::Classifier` otherwise.
    async fn classify(&self, poster: &Poster) -> Result<Verdict>;
}

/// Social posting client.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Upload image bytes with alt text, returning the media id.
    async fn upload_media(&self, bytes: Vec<u8>, alt_text: &str) -> Result<String>;

    /// Create a status with attached media, returning the status id.
    async fn create_status(
        &self,
        text: &str,
        media_ids: &[String],
        visibility: Visibility,
    ) -> Result<String>;

    /// Reply to an existing status, returning the reply id.
    async fn reply(&self, parent_id: &str, text: &str) -> Result<String>;
}

/// Downloads image bytes for publishing.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>>;
}
