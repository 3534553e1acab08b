// src/pipeline/publish.rs

//! Publish one poster per invocation.

use rand::Rng;
use rand::rngs::StdRng;

use crate::error::{AppError, Result};
use crate::models::{Config, Poster, Visibility, secret_from_env};
use crate::pipeline::FairSelector;
use crate::services::{HttpMediaSource, MastodonPublisher, MediaSource, Publisher};
use crate::storage::{LocalStorage, PosterStore};
use crate::utils::{hashtags, http};

/// Status body: title, blank line, id, two blank lines, hashtags.
pub fn status_text(title: &str, id: &str, hashtags: &str) -> String {
    format!("{title}\n\n{id}\n\n\n{hashtags}")
}

/// Everything computed for a poster before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPreview {
    pub poster: Poster,
    /// Largest image, if the poster has any
    pub image_url: Option<String>,
    pub alt_text: String,
    pub hashtags: String,
    pub status_text: String,
}

impl PublishPreview {
    pub fn for_poster(poster: &Poster) -> Self {
        let tags = hashtags(&poster.subjects);
        Self {
            image_url: poster.largest_image_url().map(str::to_string),
            alt_text: poster.alt_text().to_string(),
            status_text: status_text(&poster.title, &poster.id, &tags),
            hashtags: tags,
            poster: poster.clone(),
        }
    }
}

/// Result of a publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Nothing sent, nothing written
    DryRun(PublishPreview),
    Published {
        poster_id: String,
        status_id: String,
        posted_count: u32,
    },
    /// The attempt failed; `posted_count` was left alone
    Failed { poster_id: String, reason: String },
}

/// Selects, posts, and records one poster.
pub struct PublishOrchestrator<P, M, R = StdRng> {
    publisher: P,
    media: M,
    visibility: Visibility,
    selector: FairSelector<R>,
}

impl<P: Publisher, M: MediaSource> PublishOrchestrator<P, M, StdRng> {
    pub fn new(publisher: P, media: M, visibility: Visibility) -> Self {
        Self::with_selector(publisher, media, visibility, FairSelector::new())
    }
}

impl<P: Publisher, M: MediaSource, R: Rng> PublishOrchestrator<P, M, R> {
    pub fn with_selector(
        publisher: P,
        media: M,
        visibility: Visibility,
        selector: FairSelector<R>,
    ) -> Self {
        Self {
            publisher,
            media,
            visibility,
            selector,
        }
    }

    /// Publish the least-published eligible poster.
    ///
    /// Store failures and an empty eligible set are returned as errors. Any
    /// failure while downloading, uploading or posting is logged and reported
    /// as [`PublishOutcome::Failed`] without touching the store.
    pub async fn publish_one(
        &mut self,
        store: &mut PosterStore,
        dry_run: bool,
    ) -> Result<PublishOutcome> {
        store.load().await?;

        let preview = {
            let eligible = store.eligible();
            let poster = self.selector.select(&eligible)?;
            log::info!(
                "Selected {} of {} eligible posters (posted {} times)",
                poster.id,
                eligible.len(),
                poster.posted_count
            );
            PublishPreview::for_poster(poster)
        };

        if dry_run {
            log::info!("Dry run: nothing will be posted");
            return Ok(PublishOutcome::DryRun(preview));
        }

        let poster_id = preview.poster.id.clone();
        let status_id = match self.deliver(&preview).await {
            Ok(status_id) => status_id,
            Err(e) => {
                log::error!("Error posting {}: {}", poster_id, e);
                return Ok(PublishOutcome::Failed {
                    poster_id,
                    reason: e.to_string(),
                });
            }
        };
        log::info!("Posted successfully: {}", status_id);

        store
            .update_by_id(&poster_id, |p| p.posted_count += 1)
            .await
            .inspect_err(|e| {
                log::error!(
                    "Status {} is live but the count for {} was not saved: {}",
                    status_id,
                    poster_id,
                    e
                )
            })?;
        let posted_count = store.get(&poster_id).map_or(0, |p| p.posted_count);

        Ok(PublishOutcome::Published {
            poster_id,
            status_id,
            posted_count,
        })
    }

    async fn deliver(&self, preview: &PublishPreview) -> Result<String> {
        let url = preview
            .image_url
            .as_deref()
            .ok_or_else(|| AppError::publish("poster has no image URL"))?;

        let bytes = self.media.fetch_image(url).await?;
        let media_id = self.publisher.upload_media(bytes, &preview.alt_text).await?;
        self.publisher
            .create_status(&preview.status_text, &[media_id], self.visibility)
            .await
    }
}

/// Publish one poster using the configured instance.
pub async fn run_publish(
    config: &Config,
    storage: &LocalStorage,
    dry_run: bool,
) -> Result<PublishOutcome> {
    let client = http::create_async_client(&config.crawler)?;
    let access_token = if dry_run {
        String::new()
    } else {
        secret_from_env(&config.publisher.access_token_env)?
    };

    let publisher = MastodonPublisher::new(client.clone(), &config.publisher, access_token);
    let media = HttpMediaSource::new(client);
    let mut orchestrator = PublishOrchestrator::new(publisher, media, config.publisher.visibility);

    let mut store = PosterStore::new(storage.clone(), &config.store.posters_file);
    orchestrator.publish_one(&mut store, dry_run).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Moderation;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const KEY: &str = "posters.json";

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Upload { bytes: Vec<u8>, alt_text: String },
        Status { text: String, media_ids: Vec<String>, visibility: Visibility },
    }

    #[derive(Default)]
    struct FakePublisher {
        calls: Mutex<Vec<Call>>,
        fail_status: bool,
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn upload_media(&self, bytes: Vec<u8>, alt_text: &str) -> Result<String> {
            self.calls.lock().unwrap().push(Call::Upload {
                bytes,
                alt_text: alt_text.to_string(),
            });
            Ok("media-1".into())
        }

        async fn create_status(
            &self,
            text: &str,
            media_ids: &[String],
            visibility: Visibility,
        ) -> Result<String> {
            self.calls.lock().unwrap().push(Call::Status {
                text: text.to_string(),
                media_ids: media_ids.to_vec(),
                visibility,
            });
            if self.fail_status {
                return Err(AppError::publish("HTTP 503 Service Unavailable"));
            }
            Ok("status-1".into())
        }

        async fn reply(&self, _parent_id: &str, _text: &str) -> Result<String> {
            Ok("reply-1".into())
        }
    }

    #[derive(Default)]
    struct FakeMedia {
        requested: Mutex<Vec<String>>,
        broken: bool,
    }

    #[async_trait]
    impl MediaSource for FakeMedia {
        async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
            self.requested.lock().unwrap().push(url.to_string());
            if self.broken {
                return Err(AppError::publish("image download failed: HTTP 404"));
            }
            Ok(vec![0xFF, 0xD8, 0xFF])
        }
    }

    fn eligible(id: &str, title: &str, posted_count: u32) -> Poster {
        let mut poster = Poster::new(id, title);
        poster.image_urls = vec![
            format!("https://img.test/{id}_150.jpg"),
            format!("https://img.test/{id}_1024.jpg"),
        ];
        poster.subjects = vec!["Library of Congress".into(), "2024 Election".into()];
        poster.summary = Some(format!("Summary of {title}"));
        poster.moderation = Moderation::Checked {
            safe: true,
            warning: None,
        };
        poster.posted_count = posted_count;
        poster
    }

    async fn store_with(tmp: &TempDir, posters: Vec<Poster>) -> PosterStore {
        let mut store = PosterStore::open(LocalStorage::new(tmp.path()), KEY)
            .await
            .unwrap();
        store.upsert_many(posters).await.unwrap();
        store
    }

    fn orchestrator(
        publisher: FakePublisher,
        media: FakeMedia,
    ) -> PublishOrchestrator<FakePublisher, FakeMedia, StdRng> {
        PublishOrchestrator::with_selector(
            publisher,
            media,
            Visibility::Public,
            FairSelector::with_rng(StdRng::seed_from_u64(11)),
        )
    }

    async fn reloaded_count(tmp: &TempDir, id: &str) -> u32 {
        PosterStore::open(LocalStorage::new(tmp.path()), KEY)
            .await
            .unwrap()
            .get(id)
            .unwrap()
            .posted_count
    }

    #[test]
    fn test_status_text_layout() {
        assert_eq!(
            status_text("Title", "id-1", "#a #b"),
            "Title\n\nid-1\n\n\n#a #b"
        );
    }

    #[tokio::test]
    async fn test_dry_run_picks_least_posted_and_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut store = store_with(
            &tmp,
            vec![eligible("B", "Poster B", 1), eligible("A", "Poster A", 0)],
        )
        .await;

        let mut orchestrator = orchestrator(FakePublisher::default(), FakeMedia::default());
        let outcome = orchestrator.publish_one(&mut store, true).await.unwrap();

        let PublishOutcome::DryRun(preview) = outcome else {
            panic!("expected a dry run, got {outcome:?}");
        };
        assert_eq!(preview.poster.id, "A");
        assert_eq!(
            preview.status_text,
            "Poster A\n\nA\n\n\n#libraryOfCongress #tag2024Election"
        );
        assert_eq!(
            preview.image_url.as_deref(),
            Some("https://img.test/A_1024.jpg")
        );
        assert_eq!(preview.alt_text, "Summary of Poster A");

        assert!(orchestrator.publisher.calls.lock().unwrap().is_empty());
        assert!(orchestrator.media.requested.lock().unwrap().is_empty());
        assert_eq!(reloaded_count(&tmp, "A").await, 0);
        assert_eq!(reloaded_count(&tmp, "B").await, 1);
    }

    #[tokio::test]
    async fn test_live_publish_increments_count() {
        let tmp = TempDir::new().unwrap();
        let mut store = store_with(
            &tmp,
            vec![eligible("A", "Poster A", 0), eligible("B", "Poster B", 1)],
        )
        .await;

        let mut orchestrator = orchestrator(FakePublisher::default(), FakeMedia::default());
        let outcome = orchestrator.publish_one(&mut store, false).await.unwrap();

        assert_eq!(
            outcome,
            PublishOutcome::Published {
                poster_id: "A".into(),
                status_id: "status-1".into(),
                posted_count: 1,
            }
        );
        assert_eq!(
            *orchestrator.media.requested.lock().unwrap(),
            vec!["https://img.test/A_1024.jpg".to_string()]
        );
        assert_eq!(
            *orchestrator.publisher.calls.lock().unwrap(),
            vec![
                Call::Upload {
                    bytes: vec![0xFF, 0xD8, 0xFF],
                    alt_text: "Summary of Poster A".into(),
                },
                Call::Status {
                    text: "Poster A\n\nA\n\n\n#libraryOfCongress #tag2024Election".into(),
                    media_ids: vec!["media-1".into()],
                    visibility: Visibility::Public,
                },
            ]
        );
        assert_eq!(reloaded_count(&tmp, "A").await, 1);
    }

    #[tokio::test]
    async fn test_failed_status_leaves_count_unchanged() {
        let tmp = TempDir::new().unwrap();
        let mut store = store_with(&tmp, vec![eligible("A", "Poster A", 2)]).await;

        let publisher = FakePublisher {
            fail_status: true,
            ..FakePublisher::default()
        };
        let mut orchestrator = orchestrator(publisher, FakeMedia::default());
        let outcome = orchestrator.publish_one(&mut store, false).await.unwrap();

        assert!(matches!(outcome, PublishOutcome::Failed { ref poster_id, .. } if poster_id == "A"));
        assert_eq!(reloaded_count(&tmp, "A").await, 2);
    }

    #[tokio::test]
    async fn test_failed_download_never_uploads() {
        let tmp = TempDir::new().unwrap();
        let mut store = store_with(&tmp, vec![eligible("A", "Poster A", 0)]).await;

        let media = FakeMedia {
            broken: true,
            ..FakeMedia::default()
        };
        let mut orchestrator = orchestrator(FakePublisher::default(), media);
        let outcome = orchestrator.publish_one(&mut store, false).await.unwrap();

        assert!(matches!(outcome, PublishOutcome::Failed { .. }));
        assert!(orchestrator.publisher.calls.lock().unwrap().is_empty());
        assert_eq!(reloaded_count(&tmp, "A").await, 0);
    }

    #[tokio::test]
    async fn test_poster_without_image_fails() {
        let tmp = TempDir::new().unwrap();
        let mut poster = eligible("A", "Poster A", 0);
        poster.image_urls.clear();
        let mut store = store_with(&tmp, vec![poster]).await;

        let mut orchestrator = orchestrator(FakePublisher::default(), FakeMedia::default());
        let outcome = orchestrator.publish_one(&mut store, false).await.unwrap();

        assert!(matches!(outcome, PublishOutcome::Failed { .. }));
        assert!(orchestrator.media.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_eligible_posters_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let mut unchecked = eligible("A", "Poster A", 0);
        unchecked.moderation = Moderation::Unchecked;
        let mut flagged = eligible("B", "Poster B", 0);
        flagged.moderation = Moderation::Checked {
            safe: false,
            warning: Some("Hate".into()),
        };
        let mut store = store_with(&tmp, vec![unchecked, flagged]).await;

        let mut orchestrator = orchestrator(FakePublisher::default(), FakeMedia::default());
        let err = orchestrator.publish_one(&mut store, false).await.unwrap_err();

        assert!(matches!(err, AppError::NoEligibleRecords));
    }

    #[tokio::test]
    async fn test_repeated_publishing_stays_balanced() {
        let tmp = TempDir::new().unwrap();
        let mut store = store_with(
            &tmp,
            vec![
                eligible("A", "Poster A", 0),
                eligible("B", "Poster B", 0),
                eligible("C", "Poster C", 0),
            ],
        )
        .await;

        let mut orchestrator = orchestrator(FakePublisher::default(), FakeMedia::default());
        for _ in 0..9 {
            orchestrator.publish_one(&mut store, false).await.unwrap();
            let stats = store.stats();
            assert!(stats.fairness_skew() <= 1);
        }
        for id in ["A", "B", "C"] {
            assert_eq!(reloaded_count(&tmp, id).await, 3);
        }
    }
}
