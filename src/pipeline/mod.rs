//! Pipeline entry points.
//!
//! - `run_crawler`: Drain the catalog into the poster store
//! - `run_annotator`: Attach moderation verdicts to unchecked posters
//! - `run_publish`: Publish the least-published eligible poster
//! - `run_optimize`: Dedupe and normalize an existing store

pub mod annotate;
pub mod crawl;
pub mod optimize;
pub mod publish;
pub mod select;

pub use annotate::{AnnotatePolicy, AnnotateReport, Annotator, run_annotator};
pub use crawl::{CrawlPolicy, CrawlReport, Crawler, run_crawler};
pub use optimize::run_optimize;
pub use publish::{PublishOrchestrator, PublishOutcome, PublishPreview, run_publish, status_text};
pub use select::{FairSelector, least_posted};
