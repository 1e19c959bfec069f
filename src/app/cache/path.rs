//! Output layout for a run
//!
//! Single-file mode downloads into a hidden sibling directory
//! `.hibp_<output name>` and merges it into the output file at the end.
//! Multi-file mode uses the output directory itself as the permanent home of
//! the `<KEY>.txt` files.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::app::models::{LineFormat, Partition};
use crate::constants::files;
use crate::errors::{TargetError, TargetResult};

/// Run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    /// One consolidated output file
    SingleFile,
    /// A directory of per-partition files
    MultiFile,
}

/// Where partition files and the final output go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    mode: TargetMode,
    output: PathBuf,
    partition_dir: PathBuf,
}

impl DownloadTarget {
    /// Build the layout for `output` in the given mode
    pub fn new(output: impl Into<PathBuf>, mode: TargetMode) -> Self {
        let output = output.into();
        let partition_dir = match mode {
            TargetMode::SingleFile => hidden_partition_dir(&output),
            TargetMode::MultiFile => output.clone(),
        };
        Self {
            mode,
            output,
            partition_dir,
        }
    }

    pub fn mode(&self) -> TargetMode {
        self.mode
    }

    /// Consolidated file (single-file) or the output folder (multi-file)
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Directory holding `<KEY>.txt` files during the run
    pub fn partition_dir(&self) -> &Path {
        &self.partition_dir
    }

    /// Destination of one partition
    pub fn partition_path(&self, partition: Partition) -> PathBuf {
        self.partition_dir.join(partition.file_name())
    }

    /// Prefixed lines when files get merged, raw bodies otherwise
    pub fn default_line_format(&self) -> LineFormat {
        match self.mode {
            TargetMode::SingleFile => LineFormat::Prefixed,
            TargetMode::MultiFile => LineFormat::Raw,
        }
    }

    /// Validate and create the on-disk layout before any request is made
    ///
    /// Returns `true` when a previous run's partitions are present and will be
    /// resumed.
    ///
    /// # Errors
    ///
    /// - `TargetError::OutputExists` if the single-file output exists without `overwrite`
    /// - `TargetError::NotADirectory` if the multi-file output is a regular file
    /// - `TargetError::DirectoryNotEmpty` if the multi-file output has content and
    ///   neither `resume` nor `overwrite` is set
    pub async fn prepare(&self, overwrite: bool, resume: bool) -> TargetResult<bool> {
        match self.mode {
            TargetMode::SingleFile => self.prepare_single(overwrite, resume).await,
            TargetMode::MultiFile => self.prepare_multi(overwrite, resume).await,
        }
    }

    async fn prepare_single(&self, overwrite: bool, resume: bool) -> TargetResult<bool> {
        if exists(&self.output).await? && !overwrite {
            return Err(TargetError::OutputExists {
                path: self.output.clone(),
            });
        }

        let dir = &self.partition_dir;
        if exists(dir).await? {
            if resume {
                info!("Resuming download of {}", self.output.display());
                return Ok(true);
            }
            debug!("Clearing stale partition directory {}", dir.display());
            tokio::fs::remove_dir_all(dir)
                .await
                .map_err(|source| io_error(dir, source))?;
        }

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| io_error(dir, source))?;
        Ok(false)
    }

    async fn prepare_multi(&self, overwrite: bool, resume: bool) -> TargetResult<bool> {
        let dir = &self.partition_dir;
        match tokio::fs::metadata(dir).await {
            Ok(metadata) => {
                if !metadata.is_dir() {
                    return Err(TargetError::NotADirectory { path: dir.clone() });
                }
                let has_files = has_entries(dir).await?;
                if has_files && !resume && !overwrite {
                    return Err(TargetError::DirectoryNotEmpty { path: dir.clone() });
                }
                if has_files && resume {
                    info!("Resuming download of {}", dir.display());
                }
                Ok(has_files && resume)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|source| io_error(dir, source))?;
                Ok(false)
            }
            Err(source) => Err(io_error(dir, source)),
        }
    }
}

/// `<parent>/.hibp_<name>` for an output file
fn hidden_partition_dir(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| files::DEFAULT_OUTPUT.to_string());
    let dir_name = format!("{}{}", files::PARTITION_DIR_PREFIX, name);
    match output.parent() {
        Some(parent) => parent.join(dir_name),
        None => PathBuf::from(dir_name),
    }
}

async fn exists(path: &Path) -> TargetResult<bool> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(io_error(path, source)),
    }
}

async fn has_entries(dir: &Path) -> TargetResult<bool> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|source| io_error(dir, source))?;
    let first = entries
        .next_entry()
        .await
        .map_err(|source| io_error(dir, source))?;
    Ok(first.is_some())
}

fn io_error(path: &Path, source: io::Error) -> TargetError {
    TargetError::Io {
        path: path.to_path_buf(),
        source,
    }
}
