// src/lib.rs

//! Poster crawler, moderation and fair-rotation publishing library

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
