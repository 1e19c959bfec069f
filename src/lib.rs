//! HIBP Fetcher Library
//!
//! A Rust library for downloading every password hash range of the Have I Been
//! Pwned range API. Provides bounded-concurrency fetching with retries, resumable
//! per-range files, and an ordered merge into a single file.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
