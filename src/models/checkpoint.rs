//! Crawl progress record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last catalog page the crawler should resume from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub last_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    pub fn new(last_url: impl Into<String>) -> Self {
        Self {
            last_url: Some(last_url.into()),
            updated_at: Some(Utc::now()),
        }
    }

    /// The resume URL, if one was recorded.
    pub fn resume_url(&self) -> Option<&str> {
        self.last_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}
