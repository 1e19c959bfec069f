//! HIBP Fetcher CLI application
//!
//! Downloads all Have I Been Pwned password hash ranges into a single file or a
//! directory of per-range files.

use std::process;

use tracing::{debug, info};
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::{fmt, EnvFilter};

use hibp_fetcher::cli::{handle_download, Cli};
use hibp_fetcher::config::AppConfig;
use hibp_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        debug!("Run failed with a {} error", e.category());
        eprintln!("Error: {}", e);
        if e.is_recoverable() {
            eprintln!("The failure looks transient; rerun with -r to resume.");
        }
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    let config = AppConfig::load(cli.global.config.as_deref()).await?;

    init_logging(&cli, &config);
    info!("HIBP Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    handle_download(cli, config).await
}

/// Initialize logging from the verbosity flags, then the config file
fn init_logging(cli: &Cli, config: &AppConfig) {
    let level = cli
        .log_level_override()
        .map(str::to_string)
        .or_else(|| config.logging.level.clone())
        .unwrap_or_else(|| cli.log_level().to_string());

    let directive: Directive = format!("hibp_fetcher={}", level)
        .parse()
        .unwrap_or_else(|_| Directive::from(LevelFilter::WARN));
    let filter = EnvFilter::from_default_env().add_directive(directive);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
