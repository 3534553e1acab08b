//! Crawl checkpoint persistence.

use crate::error::Result;
use crate::models::Checkpoint;
use crate::storage::LocalStorage;

/// Single-file record of the next catalog page to fetch.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    storage: LocalStorage,
    key: String,
}

impl CheckpointStore {
    pub fn new(storage: LocalStorage, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Resume URL from a previous run. Unreadable checkpoints are ignored.
    pub async fn load(&self) -> Option<String> {
        match self.storage.read_json::<Checkpoint>(&self.key).await {
            Ok(checkpoint) => checkpoint.and_then(|c| c.resume_url().map(str::to_string)),
            Err(e) => {
                log::warn!("Ignoring unreadable checkpoint {}: {}", self.key, e);
                None
            }
        }
    }

    /// Overwrite the checkpoint with `url`.
    pub async fn save(&self, url: &str) -> Result<()> {
        self.storage.write_json(&self.key, &Checkpoint::new(url)).await
    }

    /// Remove the checkpoint so the next crawl starts from the first page.
    pub async fn clear(&self) -> Result<()> {
        if self.storage.remove(&self.key).await? {
            log::debug!("Removed checkpoint {}", self.key);
        }
        Ok(())
    }
}
