//! Command-line argument parsing for HIBP Fetcher
//!
//! This module defines the CLI structure using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser};

use crate::app::PartitionRange;
use crate::constants::files;

/// HIBP Fetcher - Download the Have I Been Pwned password hash ranges
#[derive(Parser, Debug)]
#[command(
    name = "hibp_fetcher",
    version,
    about = "Download all Have I Been Pwned password hash ranges",
    long_about = "Downloads all 1,048,576 password hash ranges from the Have I Been Pwned range API.
Ranges are fetched concurrently with automatic retries, and either merged into a single file
or kept as one file per range."
)]
pub struct Cli {
    /// Output file (with --single) or output directory
    #[arg(value_name = "OUTPUT", default_value = files::DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Download options
    #[command(flatten)]
    pub download: DownloadArgs,

    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Arguments controlling the download
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Number of concurrent workers (0 or unset: 8 per CPU; capped at 64)
    #[arg(short, long)]
    pub parallelism: Option<usize>,

    /// Overwrite an existing output
    #[arg(short, long)]
    pub overwrite: bool,

    /// Merge all ranges into a single output file
    #[arg(short, long)]
    pub single: bool,

    /// Download NTLM hashes instead of SHA-1
    #[arg(short, long)]
    pub ntlm: bool,

    /// Resume a previous download, skipping ranges already on disk
    #[arg(short, long)]
    pub resume: bool,

    /// Keep downloading after a range fails; failures are reported at the end
    #[arg(long)]
    pub keep_going: bool,

    /// Only download this key range, e.g. 00000..=000FF
    #[arg(long, value_name = "RANGE")]
    pub range: Option<PartitionRange>,
}

/// Global arguments
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log level chosen by the verbosity flags, if any
    pub fn log_level_override(&self) -> Option<&'static str> {
        if self.global.very_verbose {
            Some("debug")
        } else if self.global.verbose {
            Some("info")
        } else if self.global.quiet {
            Some("error")
        } else {
            None
        }
    }

    /// Effective log level, flags first
    pub fn log_level(&self) -> &'static str {
        self.log_level_override().unwrap_or("warn")
    }
}
