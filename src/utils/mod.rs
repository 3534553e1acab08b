//! Utility functions and helpers.

pub mod hashtag;
pub mod http;

pub use hashtag::{hashtags, sanitize_hashtag};
