//! Command-line interface components
//!
//! This module contains CLI-specific code for the HIBP Fetcher application,
//! including argument parsing, progress display, and the download command.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{Cli, DownloadArgs, GlobalArgs};
pub use commands::{coordinator_config, handle_download};
pub use progress::ProgressDisplay;
