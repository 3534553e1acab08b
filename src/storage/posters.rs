//! Durable poster store.
//!
//! The whole collection lives in memory and is rewritten on every mutating
//! call. Callers must not run two load → mutate → write cycles against the
//! same file at once; there is no locking.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{Poster, PosterCollection};
use crate::storage::LocalStorage;

/// Borrowed view used when persisting, to avoid cloning the collection.
#[derive(Serialize)]
struct CollectionRef<'a> {
    posters: &'a [Poster],
}

/// Result of an `optimize` pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeReport {
    pub total: usize,
    pub duplicates_removed: usize,
}

/// Summary counts over the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub unchecked: usize,
    pub eligible: usize,
    pub flagged: usize,
    pub min_posted: Option<u32>,
    pub max_posted: Option<u32>,
}

impl StoreStats {
    /// Difference between the most and least published eligible posters.
    pub fn fairness_skew(&self) -> u32 {
        match (self.min_posted, self.max_posted) {
            (Some(min), Some(max)) => max - min,
            _ => 0,
        }
    }
}

/// Poster collection keyed by id, persisted as `{ "posters": [...] }`.
#[derive(Debug)]
pub struct PosterStore {
    storage: LocalStorage,
    key: String,
    posters: Vec<Poster>,
    index: HashMap<String, usize>,
    dropped_on_load: usize,
}

impl PosterStore {
    /// Create an empty, unloaded store over `key`.
    pub fn new(storage: LocalStorage, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            posters: Vec::new(),
            index: HashMap::new(),
            dropped_on_load: 0,
        }
    }

    /// Create and load in one step.
    pub async fn open(storage: LocalStorage, key: impl Into<String>) -> Result<Self> {
        let mut store = Self::new(storage, key);
        store.load().await?;
        Ok(store)
    }

    fn location(&self) -> String {
        self.storage.path(&self.key).display().to_string()
    }

    /// Read the persisted collection, replacing whatever is in memory.
    ///
    /// A missing or blank file is an empty store. Repeated ids keep their first
    /// occurrence; the rest are dropped from memory and vanish on the next write.
    pub async fn load(&mut self) -> Result<()> {
        let collection: PosterCollection = self
            .storage
            .read_json(&self.key)
            .await
            .map_err(|e| AppError::store_unavailable(self.location(), e))?
            .unwrap_or_default();

        self.posters.clear();
        self.index.clear();
        self.dropped_on_load = 0;

        for poster in collection.posters {
            if self.index.contains_key(&poster.id) {
                self.dropped_on_load += 1;
                continue;
            }
            self.index.insert(poster.id.clone(), self.posters.len());
            self.posters.push(poster);
        }

        if self.dropped_on_load > 0 {
            log::warn!(
                "Dropped {} duplicate posters while loading {}",
                self.dropped_on_load,
                self.location()
            );
        }
        log::debug!("Loaded {} posters from {}", self.posters.len(), self.location());
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let document = CollectionRef {
            posters: &self.posters,
        };
        self.storage
            .write_json(&self.key, &document)
            .await
            .map_err(|e| AppError::store_unavailable(self.location(), e))
    }

    /// Append posters whose id is not yet stored. Existing posters are never
    /// overwritten. Returns the number inserted.
    pub async fn upsert_many(&mut self, posters: impl IntoIterator<Item = Poster>) -> Result<usize> {
        let mut inserted = 0;
        for poster in posters {
            if self.index.contains_key(&poster.id) {
                continue;
            }
            let poster = poster.normalized();
            self.index.insert(poster.id.clone(), self.posters.len());
            self.posters.push(poster);
            inserted += 1;
        }

        if inserted > 0 {
            self.persist().await?;
        }
        Ok(inserted)
    }

    /// Apply `mutate` to the poster with `id` and persist. Returns false, without
    /// writing, if no such poster exists. The mutator must not change the id.
    pub async fn update_by_id<F>(&mut self, id: &str, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut Poster),
    {
        let Some(&position) = self.index.get(id) else {
            return Ok(false);
        };

        let poster = &mut self.posters[position];
        mutate(poster);
        debug_assert_eq!(poster.id, id, "update_by_id must not change the id");

        self.persist().await?;
        Ok(true)
    }

    /// Dedupe and normalize the whole collection, then rewrite it.
    pub async fn optimize(&mut self) -> Result<OptimizeReport> {
        self.load().await?;
        let duplicates_removed = self.dropped_on_load;

        for poster in &mut self.posters {
            *poster = std::mem::replace(poster, Poster::new("", "")).normalized();
        }
        self.persist().await?;

        Ok(OptimizeReport {
            total: self.posters.len(),
            duplicates_removed,
        })
    }

    /// All posters in store order.
    pub fn all(&self) -> &[Poster] {
        &self.posters
    }

    pub fn get(&self, id: &str) -> Option<&Poster> {
        self.index.get(id).map(|&position| &self.posters[position])
    }

    pub fn len(&self) -> usize {
        self.posters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posters.is_empty()
    }

    /// Posters without a moderation verdict, in store order.
    pub fn unannotated(&self) -> impl Iterator<Item = &Poster> {
        self.posters.iter().filter(|p| !p.moderation.is_checked())
    }

    /// Posters marked safe.
    pub fn eligible(&self) -> Vec<&Poster> {
        self.posters.iter().filter(|p| p.is_eligible()).collect()
    }

    pub fn stats(&self) -> StoreStats {
        let eligible = self.eligible();
        StoreStats {
            total: self.posters.len(),
            unchecked: self.unannotated().count(),
            eligible: eligible.len(),
            flagged: self
                .posters
                .iter()
                .filter(|p| p.moderation.is_checked() && !p.is_eligible())
                .count(),
            min_posted: eligible.iter().map(|p| p.posted_count).min(),
            max_posted: eligible.iter().map(|p| p.posted_count).max(),
        }
    }
}
