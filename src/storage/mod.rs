//! Storage for posters and crawl progress.
//!
//! Both documents are plain JSON files under one storage directory, written
//! through [`LocalStorage`] with write-to-temp-then-rename semantics.

pub mod checkpoint;
pub mod local;
pub mod posters;

// Re-export for convenience
pub use checkpoint::CheckpointStore;
pub use local::LocalStorage;
pub use posters::{OptimizeReport, PosterStore, StoreStats};
