//! Command handler for HIBP Fetcher CLI
//!
//! Coordinates between CLI arguments, the loaded configuration and the core
//! download pipeline: prepare the output, run the workers, print the report and
//! merge the partitions when a single file was asked for.

use std::sync::Arc;

use tracing::{info, warn};

use crate::app::{
    Consolidator, Coordinator, CoordinatorConfig, DownloadTarget, FailurePolicy, HashMode,
    RangeClient, TargetMode,
};
use crate::cli::{Cli, ProgressDisplay};
use crate::config::AppConfig;
use crate::errors::Result;

/// Handle a download run
///
/// # Errors
///
/// Returns `AppError` when the output cannot be prepared, the run fails or is
/// interrupted, any partition failed, or the merge fails.
pub async fn handle_download(cli: Cli, config: AppConfig) -> Result<()> {
    let run_config = coordinator_config(&cli, &config);
    let mode = if cli.download.single {
        TargetMode::SingleFile
    } else {
        TargetMode::MultiFile
    };

    let target = DownloadTarget::new(&cli.output, mode);
    let resuming = target
        .prepare(cli.download.overwrite, run_config.resume)
        .await?;
    if resuming && !cli.global.quiet {
        println!("Resuming download of {}", cli.output.display());
    }

    let client_config = config
        .client
        .clone()
        .with_pool_for_parallelism(run_config.parallelism);
    let client = Arc::new(RangeClient::with_config(client_config)?);

    let total = u64::from(run_config.partitions.len());
    let progress = Arc::new(ProgressDisplay::new(
        total,
        format!("{} ranges", run_config.hash_mode),
        !cli.global.quiet,
    ));

    let coordinator = Coordinator::new(run_config, client, target.clone()).with_progress(progress);
    let result = coordinator.run_downloads().await?;

    if !cli.global.quiet {
        println!("{}", result.report());
    }

    if let Err(e) = result.ensure_complete() {
        warn!(
            "Keeping {} so the run can be resumed with -r",
            target.partition_dir().display()
        );
        return Err(e.into());
    }

    if mode == TargetMode::SingleFile {
        let summary = Consolidator::new(target.partition_dir(), target.output())
            .consolidate()
            .await?;
        info!(
            "Merged {} ranges ({} bytes) into {}",
            summary.partitions,
            summary.bytes,
            target.output().display()
        );
    }

    Ok(())
}

/// File settings with command-line flags applied on top
pub fn coordinator_config(cli: &Cli, config: &AppConfig) -> CoordinatorConfig {
    let args = &cli.download;
    let mut run_config = config.download.clone();

    if let Some(parallelism) = args.parallelism {
        run_config = run_config.with_parallelism(parallelism);
    }
    if args.resume {
        run_config = run_config.with_resume(true);
    }
    if args.keep_going {
        run_config = run_config.with_failure_policy(FailurePolicy::Continue);
    }
    if args.ntlm {
        run_config = run_config.with_hash_mode(HashMode::Ntlm);
    }
    if let Some(range) = args.range {
        run_config = run_config.with_partitions(range);
    }

    let workers = run_config.worker_count();
    run_config.with_parallelism(workers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::coordinator::default_parallelism;
    use crate::app::PartitionRange;
    use crate::constants::workers::MAX_WORKER_COUNT;
    use clap::Parser;

    #[test]
    fn test_flags_override_file_settings() {
        let mut config = AppConfig::default();
        config.download.parallelism = 4;
        config.download.resume = true;

        let cli = Cli::try_parse_from([
            "hibp_fetcher",
            "-p",
            "12",
            "-n",
            "--keep-going",
            "--range",
            "00010..00020",
        ])
        .unwrap();
        let run_config = coordinator_config(&cli, &config);

        assert_eq!(run_config.parallelism, 12);
        assert_eq!(run_config.hash_mode, HashMode::Ntlm);
        assert_eq!(run_config.failure_policy, FailurePolicy::Continue);
        assert_eq!(run_config.partitions, PartitionRange::new(0x10..0x20));
        // A file-level resume is not switched off by a missing flag
        assert!(run_config.resume);
    }

    #[test]
    fn test_file_settings_without_flags() {
        let mut config = AppConfig::default();
        config.download.parallelism = 3;

        let cli = Cli::try_parse_from(["hibp_fetcher"]).unwrap();
        let run_config = coordinator_config(&cli, &config);

        assert_eq!(run_config.parallelism, 3);
        assert_eq!(run_config.failure_policy, FailurePolicy::FailFast);
        assert_eq!(run_config.hash_mode, HashMode::Sha1);
        assert!(run_config.partitions.is_full());
    }

    #[test]
    fn test_parallelism_zero_and_oversized() {
        let config = AppConfig::default();

        let cli = Cli::try_parse_from(["hibp_fetcher", "-p", "0"]).unwrap();
        let run_config = coordinator_config(&cli, &config);
        assert_eq!(run_config.parallelism, default_parallelism());

        let cli = Cli::try_parse_from(["hibp_fetcher", "-p", "100"]).unwrap();
        let run_config = coordinator_config(&cli, &config);
        assert_eq!(run_config.parallelism, MAX_WORKER_COUNT);
    }
}
