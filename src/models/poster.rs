//! Poster data structure and normalization rules.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Moderation state of a poster.
///
/// Stored on disk as two flat fields, `safe` and `content_warning`; a record
/// without `safe` has not been checked yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Moderation {
    #[default]
    Unchecked,
    Checked {
        safe: bool,
        warning: Option<String>,
    },
}

impl Moderation {
    pub fn is_checked(&self) -> bool {
        matches!(self, Self::Checked { .. })
    }

    /// Only posters explicitly marked safe may be published.
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Checked { safe: true, .. })
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            Self::Checked { warning, .. } => warning.as_deref(),
            Self::Unchecked => None,
        }
    }
}

/// Classifier output for a single poster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub safe: bool,
    #[serde(default, rename = "content_warning", alias = "warning")]
    pub warning: Option<String>,
}

impl From<Verdict> for Moderation {
    fn from(verdict: Verdict) -> Self {
        Self::Checked {
            safe: verdict.safe,
            warning: verdict.warning.filter(|w| !w.trim().is_empty()),
        }
    }
}

/// A catalog poster in its canonical shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PosterRecord", into = "PosterRecord")]
pub struct Poster {
    /// Catalog-assigned identifier, unique across the store
    pub id: String,

    pub title: String,

    /// Either a bare year (`1943`) or whatever the catalog supplied
    pub date: Option<String>,

    pub description: Option<String>,

    /// Image URLs, smallest first
    pub image_urls: Vec<String>,

    pub subjects: Vec<String>,

    pub summary: Option<String>,

    pub medium: Option<String>,

    pub moderation: Moderation,

    /// Number of confirmed publications
    pub posted_count: u32,
}

impl Poster {
    /// Create an unchecked, never-posted poster.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            date: None,
            description: None,
            image_urls: Vec::new(),
            subjects: Vec::new(),
            summary: None,
            medium: None,
            moderation: Moderation::Unchecked,
            posted_count: 0,
        }
    }

    /// Apply the canonical normalization rules. Idempotent.
    pub fn normalized(mut self) -> Self {
        self.date = normalize_date(self.date.as_deref());
        self.description = self.description.filter(|s| !s.is_empty());
        self.medium = self.medium.filter(|s| !s.is_empty());
        self
    }

    /// The last (largest) image URL.
    pub fn largest_image_url(&self) -> Option<&str> {
        self.image_urls.last().map(String::as_str)
    }

    /// Alt text for the published image: summary, then description.
    pub fn alt_text(&self) -> &str {
        self.summary
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.description.as_deref())
            .unwrap_or("")
    }

    pub fn is_eligible(&self) -> bool {
        self.moderation.is_safe()
    }
}

/// Collapse a `YYYY-01-01` date to its bare year.
pub fn normalize_date(date: Option<&str>) -> Option<String> {
    let date = date?;
    match date.strip_suffix("-01-01") {
        Some(year) if year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()) => {
            Some(year.to_string())
        }
        _ => Some(date.to_string()),
    }
}

/// Reduce a loosely typed catalog value to a single string.
///
/// Lists keep their first element; empty strings and non-text values become `None`.
pub(crate) fn first_text(value: Option<Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s,
        Value::Array(items) => match items.into_iter().next()? {
            Value::String(s) => s,
            _ => return None,
        },
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// On-disk shape, compatible with the legacy database layout.
#[derive(Debug, Serialize, Deserialize)]
struct PosterRecord {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    description: Option<Value>,
    #[serde(default)]
    image_url: Option<Vec<String>>,
    #[serde(default)]
    subject: Option<Vec<String>>,
    #[serde(default)]
    summary: Option<Value>,
    #[serde(default)]
    medium: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    safe: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_warning: Option<String>,
    #[serde(default)]
    posted_count: Option<u32>,
}

impl From<PosterRecord> for Poster {
    fn from(record: PosterRecord) -> Self {
        let moderation = match record.safe {
            Some(safe) => Moderation::Checked {
                safe,
                warning: record.content_warning,
            },
            None => Moderation::Unchecked,
        };

        Poster {
            id: record.id,
            title: record.title.unwrap_or_default(),
            date: record.date,
            description: first_text(record.description),
            image_urls: record.image_url.unwrap_or_default(),
            subjects: record.subject.unwrap_or_default(),
            summary: first_text(record.summary),
            medium: first_text(record.medium),
            moderation,
            posted_count: record.posted_count.unwrap_or(0),
        }
        .normalized()
    }
}

impl From<Poster> for PosterRecord {
    fn from(poster: Poster) -> Self {
        let (safe, content_warning) = match poster.moderation {
            Moderation::Checked { safe, warning } => (Some(safe), warning),
            Moderation::Unchecked => (None, None),
        };

        PosterRecord {
            id: poster.id,
            title: Some(poster.title),
            date: poster.date,
            description: poster.description.map(Value::String),
            image_url: Some(poster.image_urls),
            subject: Some(poster.subjects),
            summary: poster.summary.map(Value::String),
            medium: poster.medium.map(Value::String),
            safe,
            content_warning,
            posted_count: Some(poster.posted_count),
        }
    }
}
