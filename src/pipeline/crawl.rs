// src/pipeline/crawl.rs

//! Resumable catalog crawl.
//!
//! Pages are fetched strictly in catalog order. A page's posters are merged
//! into the store before the checkpoint moves past it, so a killed crawl
//! resumes at the first page that may not have been merged. Re-fetching a
//! merged page is harmless because the store ignores known ids.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{CatalogPage, Config, CrawlerConfig, Poster};
use crate::services::{LocCatalogFetcher, PageFetcher};
use crate::storage::{CheckpointStore, LocalStorage, PosterStore};

/// Retry behavior for the crawl loop.
#[derive(Debug, Clone)]
pub struct CrawlPolicy {
    /// Wait before re-fetching a page that failed
    pub retry_delay: Duration,
}

impl From<&CrawlerConfig> for CrawlPolicy {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            retry_delay: Duration::from_secs(config.retry_delay_secs),
        }
    }
}

/// Crawl loop states.
#[derive(Debug)]
enum CrawlState {
    Idle,
    Fetching(String),
    Saving { url: String, page: CatalogPage },
    Backoff(String),
    Done,
}

/// Summary of a crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// URL the run started from (first page or checkpoint)
    pub start_url: String,
    pub resumed: bool,
    pub pages: usize,
    pub fetched: usize,
    pub inserted: usize,
    pub retries: usize,
    /// Stopped by the cancellation token before the last page
    pub cancelled: bool,
}

/// Drains the catalog into the poster store.
pub struct Crawler<F> {
    fetcher: F,
    checkpoints: CheckpointStore,
    first_page_url: String,
    policy: CrawlPolicy,
    cancel: CancellationToken,
}

impl<F: PageFetcher> Crawler<F> {
    pub fn new(
        fetcher: F,
        checkpoints: CheckpointStore,
        first_page_url: impl Into<String>,
        policy: CrawlPolicy,
    ) -> Self {
        Self {
            fetcher,
            checkpoints,
            first_page_url: first_page_url.into(),
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between attempts when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Crawl until the catalog has no next page or the run is cancelled.
    ///
    /// Fetch failures are retried on the same URL forever; store and
    /// checkpoint write failures end the run with an error.
    pub async fn run(&self, store: &mut PosterStore) -> Result<CrawlReport> {
        let mut report = CrawlReport::default();
        let mut state = CrawlState::Idle;

        loop {
            state = match state {
                CrawlState::Idle => {
                    let url = match self.checkpoints.load().await {
                        Some(url) => {
                            log::info!("Resuming from checkpoint: {}", url);
                            report.resumed = true;
                            url
                        }
                        None => {
                            log::info!("Starting from first page: {}", self.first_page_url);
                            self.first_page_url.clone()
                        }
                    };
                    report.start_url = url.clone();
                    CrawlState::Fetching(url)
                }

                CrawlState::Fetching(url) => {
                    if self.cancel.is_cancelled() {
                        report.cancelled = true;
                        break;
                    }

                    log::info!("Fetching: {}", url);
                    match self.fetcher.fetch(&url).await {
                        Ok(page) => CrawlState::Saving { url, page },
                        Err(e) => {
                            log::error!("Error fetching {}: {}", url, e);
                            CrawlState::Backoff(url)
                        }
                    }
                }

                CrawlState::Backoff(url) => {
                    report.retries += 1;
                    log::warn!(
                        "Retrying in {} seconds...",
                        self.policy.retry_delay.as_secs()
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            report.cancelled = true;
                            break;
                        }
                        _ = tokio::time::sleep(self.policy.retry_delay) => CrawlState::Fetching(url),
                    }
                }

                CrawlState::Saving {
                    url,
                    page: CatalogPage { results, next_url },
                } => {
                    let fetched = results.len();
                    let inserted = store
                        .upsert_many(results.into_iter().map(Poster::from))
                        .await?;

                    report.pages += 1;
                    report.fetched += fetched;
                    report.inserted += inserted;
                    log::info!(
                        "Saved {} new of {} posters from {}",
                        inserted,
                        fetched,
                        url
                    );

                    match next_url {
                        Some(next) => {
                            self.checkpoints.save(&next).await?;
                            CrawlState::Fetching(next)
                        }
                        None => CrawlState::Done,
                    }
                }

                CrawlState::Done => {
                    self.checkpoints.clear().await?;
                    log::info!("Finished fetching all posters");
                    break;
                }
            };
        }

        Ok(report)
    }
}

/// Run the catalog crawler against the configured storage directory.
pub async fn run_crawler(
    config: &Config,
    storage: &LocalStorage,
    cancel: CancellationToken,
) -> Result<CrawlReport> {
    let start_time = Utc::now();

    let mut store = PosterStore::open(storage.clone(), &config.store.posters_file).await?;
    let checkpoints = CheckpointStore::new(storage.clone(), &config.store.checkpoint_file);
    let fetcher = LocCatalogFetcher::new(&config.crawler)?;

    let crawler = Crawler::new(
        fetcher,
        checkpoints,
        config.crawler.first_page_url()?,
        CrawlPolicy::from(&config.crawler),
    )
    .with_cancellation(cancel);

    let report = crawler.run(&mut store).await?;

    log::info!(
        "Crawl {} after {}s: {} pages, {} fetched, {} new, {} retries, {} posters stored",
        if report.cancelled { "cancelled" } else { "complete" },
        (Utc::now() - start_time).num_seconds(),
        report.pages,
        report.fetched,
        report.inserted,
        report.retries,
        store.len()
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::RawRecord;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const FIRST: &str = "https://catalog.test/?sp=1";

    fn page_url(n: usize) -> String {
        format!("https://catalog.test/?sp={n}")
    }

    fn record(id: &str) -> RawRecord {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "date": "1936-01-01",
            "description": [format!("{id} description")],
            "image_url": [format!("https://img.test/{id}.jpg")],
            "subject": ["Posters"],
            "item": { "title": format!("Title {id}"), "medium": ["1 print"] }
        }))
        .unwrap()
    }

    /// Serves a fixed catalog; URLs in `failures` fail that many times first.
    struct FakeCatalog {
        pages: HashMap<String, (Vec<&'static str>, Option<String>)>,
        failures: Mutex<HashMap<String, usize>>,
        requested: Mutex<Vec<String>>,
        cancel_after_failures: Option<(usize, CancellationToken)>,
    }

    impl FakeCatalog {
        fn three_pages() -> Self {
            let mut pages = HashMap::new();
            pages.insert(page_url(1), (vec!["a", "b"], Some(page_url(2))));
            pages.insert(page_url(2), (vec!["c", "b"], Some(page_url(3))));
            pages.insert(page_url(3), (vec!["d"], None));
            Self {
                pages,
                failures: Mutex::new(HashMap::new()),
                requested: Mutex::new(Vec::new()),
                cancel_after_failures: None,
            }
        }

        fn failing(self, url: String, times: usize) -> Self {
            self.failures.lock().unwrap().insert(url, times);
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for FakeCatalog {
        async fn fetch(&self, url: &str) -> Result<CatalogPage> {
            let attempt = {
                let mut requested = self.requested.lock().unwrap();
                requested.push(url.to_string());
                requested.iter().filter(|u| *u == url).count()
            };

            if let Some(&times) = self.failures.lock().unwrap().get(url) {
                if attempt <= times {
                    if let Some((limit, token)) = &self.cancel_after_failures {
                        if attempt >= *limit {
                            token.cancel();
                        }
                    }
                    return Err(AppError::fetch(url, "503 Service Unavailable"));
                }
            }

            let (ids, next) = self.pages.get(url).cloned().unwrap();
            Ok(CatalogPage {
                results: ids.into_iter().map(record).collect(),
                next_url: next,
            })
        }
    }

    fn policy() -> CrawlPolicy {
        CrawlPolicy {
            retry_delay: Duration::ZERO,
        }
    }

    fn setup(tmp: &TempDir) -> (LocalStorage, CheckpointStore) {
        let storage = LocalStorage::new(tmp.path());
        let checkpoints = CheckpointStore::new(storage.clone(), "checkpoint.json");
        (storage, checkpoints)
    }

    fn ids(store: &PosterStore) -> Vec<&str> {
        store.all().iter().map(|p| p.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_crawls_every_page_in_order() {
        let tmp = TempDir::new().unwrap();
        let (storage, checkpoints) = setup(&tmp);
        let mut store = PosterStore::open(storage, "posters.json").await.unwrap();

        let crawler = Crawler::new(FakeCatalog::three_pages(), checkpoints.clone(), FIRST, policy());
        let report = crawler.run(&mut store).await.unwrap();

        assert_eq!(
            crawler.fetcher.requested(),
            vec![page_url(1), page_url(2), page_url(3)]
        );
        assert_eq!(ids(&store), vec!["a", "b", "c", "d"]);
        assert_eq!(report.pages, 3);
        assert_eq!(report.fetched, 5);
        assert_eq!(report.inserted, 4);
        assert!(!report.cancelled);
        assert!(!report.resumed);

        let a = store.get("a").unwrap();
        assert_eq!(a.date.as_deref(), Some("1936"));
        assert_eq!(a.medium.as_deref(), Some("1 print"));

        assert_eq!(checkpoints.load().await, None);
        assert!(!tmp.path().join("checkpoint.json").exists());
    }

    #[tokio::test]
    async fn test_resumes_from_checkpoint() {
        let tmp = TempDir::new().unwrap();
        let (storage, checkpoints) = setup(&tmp);
        checkpoints.save(&page_url(2)).await.unwrap();
        let mut store = PosterStore::open(storage, "posters.json").await.unwrap();

        let crawler = Crawler::new(FakeCatalog::three_pages(), checkpoints, FIRST, policy());
        let report = crawler.run(&mut store).await.unwrap();

        assert_eq!(crawler.fetcher.requested()[0], page_url(2));
        assert!(!crawler.fetcher.requested().contains(&page_url(1)));
        assert!(report.resumed);
        assert_eq!(report.start_url, page_url(2));
        assert_eq!(ids(&store), vec!["c", "b", "d"]);
    }

    #[tokio::test]
    async fn test_failed_page_is_retried_not_skipped() {
        let tmp = TempDir::new().unwrap();
        let (storage, checkpoints) = setup(&tmp);
        let mut store = PosterStore::open(storage, "posters.json").await.unwrap();

        let catalog = FakeCatalog::three_pages().failing(page_url(2), 2);
        let crawler = Crawler::new(catalog, checkpoints, FIRST, policy());
        let report = crawler.run(&mut store).await.unwrap();

        assert_eq!(
            crawler.fetcher.requested(),
            vec![page_url(1), page_url(2), page_url(2), page_url(2), page_url(3)]
        );
        assert_eq!(report.retries, 2);
        assert_eq!(ids(&store), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_cancel_keeps_checkpoint_after_merged_page() {
        let tmp = TempDir::new().unwrap();
        let (storage, checkpoints) = setup(&tmp);
        let mut store = PosterStore::open(storage.clone(), "posters.json").await.unwrap();

        let token = CancellationToken::new();
        let mut catalog = FakeCatalog::three_pages().failing(page_url(2), usize::MAX);
        catalog.cancel_after_failures = Some((3, token.clone()));

        let crawler =
            Crawler::new(catalog, checkpoints.clone(), FIRST, policy()).with_cancellation(token);
        let report = crawler.run(&mut store).await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.pages, 1);
        assert_eq!(checkpoints.load().await, Some(page_url(2)));

        let reloaded = PosterStore::open(storage, "posters.json").await.unwrap();
        assert_eq!(ids(&reloaded), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_recrawl_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let (storage, checkpoints) = setup(&tmp);
        let mut store = PosterStore::open(storage, "posters.json").await.unwrap();

        let crawler = Crawler::new(FakeCatalog::three_pages(), checkpoints, FIRST, policy());
        crawler.run(&mut store).await.unwrap();
        store
            .update_by_id("c", |p| p.posted_count = 2)
            .await
            .unwrap();

        let again = crawler.run(&mut store).await.unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(store.len(), 4);
        assert_eq!(store.get("c").unwrap().posted_count, 2);
    }
}
