// src/models/mod.rs

//! Domain models for the poster pipeline.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod catalog;
mod checkpoint;
mod config;
mod poster;

// Re-export all public types
pub use catalog::{CatalogPage, CatalogResponse, Pagination, RawItem, RawRecord};
pub use checkpoint::Checkpoint;
pub use config::{
    Config, CrawlerConfig, ModerationConfig, PublisherConfig, StoreConfig, Visibility,
    secret_from_env,
};
pub use poster::{Moderation, Poster, Verdict, normalize_date};

/// Whole-store document as persisted on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PosterCollection {
    #[serde(default)]
    pub posters: Vec<Poster>,
}
