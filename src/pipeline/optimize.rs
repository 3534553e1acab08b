// src/pipeline/optimize.rs

//! One-off store cleanup.

use crate::error::Result;
use crate::models::Config;
use crate::storage::{LocalStorage, OptimizeReport, PosterStore};

/// Dedupe and normalize the poster store in place.
pub async fn run_optimize(config: &Config, storage: &LocalStorage) -> Result<OptimizeReport> {
    let mut store = PosterStore::new(storage.clone(), &config.store.posters_file);
    let report = store.optimize().await?;

    log::info!(
        "Optimized database. Total posters: {} ({} duplicates removed)",
        report.total,
        report.duplicates_removed
    );
    if let Some(sample) = store.all().first() {
        log::debug!("Sample poster: {:?}", sample);
    }

    Ok(report)
}
