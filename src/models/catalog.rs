//! Catalog API page and record shapes.

use serde::Deserialize;
use serde_json::Value;

use super::poster::{Poster, first_text};

/// One JSON page as returned by the catalog search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogResponse {
    #[serde(default)]
    pub results: Vec<RawRecord>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub next: Option<String>,
}

/// A catalog record before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    pub id: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub image_url: Option<Vec<String>>,
    #[serde(default)]
    pub subject: Option<Vec<String>>,
    #[serde(default)]
    pub item: RawItem,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<Value>,
    #[serde(default)]
    pub medium: Option<Value>,
}

impl From<RawRecord> for Poster {
    fn from(raw: RawRecord) -> Self {
        let mut poster = Poster::new(raw.id, raw.item.title.unwrap_or_default());
        poster.date = raw.date;
        poster.description = first_text(raw.description);
        poster.image_urls = raw.image_url.unwrap_or_default();
        poster.subjects = raw.subject.unwrap_or_default();
        poster.summary = first_text(raw.item.summary);
        poster.medium = first_text(raw.item.medium);
        poster.normalized()
    }
}

/// A fetched page reduced to what the crawler needs.
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub results: Vec<RawRecord>,
    /// URL of the following page; `None` on the last page
    pub next_url: Option<String>,
}

impl From<CatalogResponse> for CatalogPage {
    fn from(response: CatalogResponse) -> Self {
        Self {
            results: response.results,
            next_url: response
                .pagination
                .next
                .filter(|next| !next.trim().is_empty()),
        }
    }
}
