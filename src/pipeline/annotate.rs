// src/pipeline/annotate.rs

//! Moderation pass over unchecked posters.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{Config, Moderation, ModerationConfig, secret_from_env};
use crate::services::{Classifier, GeminiClassifier};
use crate::storage::{LocalStorage, PosterStore};
use crate::utils::http;

/// Pacing for classifier calls.
#[derive(Debug, Clone)]
pub struct AnnotatePolicy {
    /// Wait after a rate-limit response before retrying the same poster
    pub rate_limit_backoff: Duration,
    /// Pause after each successful classification
    pub request_delay: Duration,
}

impl From<&ModerationConfig> for AnnotatePolicy {
    fn from(config: &ModerationConfig) -> Self {
        Self {
            rate_limit_backoff: Duration::from_secs(config.rate_limit_backoff_secs),
            request_delay: Duration::from_millis(config.request_delay_ms),
        }
    }
}

/// Summary of an annotation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotateReport {
    pub total: usize,
    pub already_checked: usize,
    /// Verdicts written in this run
    pub checked: usize,
    /// Of those, verdicts marked unsafe
    pub flagged: usize,
    /// Posters left unchecked after a classifier error
    pub unresolved: usize,
    pub rate_limited: usize,
    pub cancelled: bool,
}

/// Attaches a moderation verdict to every unchecked poster, once.
pub struct Annotator<C> {
    classifier: C,
    policy: AnnotatePolicy,
    cancel: CancellationToken,
}

impl<C: Classifier> Annotator<C> {
    pub fn new(classifier: C, policy: AnnotatePolicy) -> Self {
        Self {
            classifier,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Sleep unless cancelled first. Returns false on cancellation.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Walk the store once in order. Each verdict is persisted as soon as it
    /// arrives.
    pub async fn run(&self, store: &mut PosterStore) -> Result<AnnotateReport> {
        let ids: Vec<String> = store.all().iter().map(|p| p.id.clone()).collect();
        let mut report = AnnotateReport {
            total: ids.len(),
            ..AnnotateReport::default()
        };

        let mut position = 0;
        while position < ids.len() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let id = &ids[position];
            let Some(poster) = store.get(id) else {
                position += 1;
                continue;
            };

            if poster.moderation.is_checked() {
                log::debug!(
                    "Skipping poster {} of {} (already checked)",
                    position + 1,
                    report.total
                );
                report.already_checked += 1;
                position += 1;
                continue;
            }

            log::info!("Checking poster {} of {}", position + 1, report.total);

            let result = self.classifier.classify(poster).await;
            match result {
                Ok(verdict) => {
                    let moderation = Moderation::from(verdict);
                    log::info!(
                        "Poster {} processed. Safe: {}, Warning: {}",
                        id,
                        moderation.is_safe(),
                        moderation.warning().unwrap_or("None")
                    );
                    if !moderation.is_safe() {
                        report.flagged += 1;
                    }

                    store.update_by_id(id, |p| p.moderation = moderation).await?;
                    report.checked += 1;
                    position += 1;

                    if !self.pause(self.policy.request_delay).await {
                        report.cancelled = true;
                        break;
                    }
                }
                Err(e) if e.is_rate_limited() => {
                    report.rate_limited += 1;
                    log::warn!(
                        "{}. Waiting {} seconds before retrying...",
                        e,
                        self.policy.rate_limit_backoff.as_secs()
                    );
                    if !self.pause(self.policy.rate_limit_backoff).await {
                        report.cancelled = true;
                        break;
                    }
                }
                Err(e) => {
                    log::error!("Error processing poster {}: {}", id, e);
                    report.unresolved += 1;
                    position += 1;
                }
            }
        }

        Ok(report)
    }
}

/// Run the moderation annotator against the configured storage directory.
pub async fn run_annotator(
    config: &Config,
    storage: &LocalStorage,
    cancel: CancellationToken,
) -> Result<AnnotateReport> {
    let api_key = secret_from_env(&config.moderation.api_key_env)?;
    let client = http::create_async_client(&config.crawler)?;
    let classifier = GeminiClassifier::new(client, &config.moderation, api_key);

    let mut store = PosterStore::open(storage.clone(), &config.store.posters_file).await?;
    let annotator = Annotator::new(classifier, AnnotatePolicy::from(&config.moderation))
        .with_cancellation(cancel);

    let report = annotator.run(&mut store).await?;

    log::info!(
        "Moderation pass {}: {} checked ({} flagged), {} already checked, {} unresolved, {} rate limits",
        if report.cancelled { "cancelled" } else { "complete" },
        report.checked,
        report.flagged,
        report.already_checked,
        report.unresolved,
        report.rate_limited
    );
    if report.unresolved > 0 {
        log::warn!(
            "{} posters are still unchecked; run the annotator again to retry them",
            report.unresolved
        );
    }

    Ok(report)
}
