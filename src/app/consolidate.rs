//! Merge of partition files into the single output file
//!
//! Partition files are concatenated in ascending key order into `<output>.tmp`,
//! which is renamed onto the output only once every byte is on disk. The
//! partition files and their directory are removed afterwards. On failure the
//! partial `.tmp` file is left in place for inspection and the partition files
//! are kept, so a resumed run can try again.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use crate::app::client::temp_path_for;
use crate::app::models::Partition;
use crate::constants::files;
use crate::errors::{ConsolidationError, ConsolidationResult};

/// Outcome of a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsolidationSummary {
    /// Partition files merged
    pub partitions: usize,
    /// Bytes written to the output
    pub bytes: u64,
}

/// Concatenates a partition directory into one file
#[derive(Debug, Clone)]
pub struct Consolidator {
    partition_dir: PathBuf,
    output: PathBuf,
}

impl Consolidator {
    pub fn new(partition_dir: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            partition_dir: partition_dir.into(),
            output: output.into(),
        }
    }

    /// Merge, promote and clean up
    ///
    /// # Errors
    ///
    /// Returns `ConsolidationError` for any listing, open, copy, create, rename
    /// or cleanup failure.
    pub async fn consolidate(&self) -> ConsolidationResult<ConsolidationSummary> {
        let sources = self.partition_files().await?;
        info!(
            "Merging {} partition files into {}",
            sources.len(),
            self.output.display()
        );

        let temp_path = temp_path_for(&self.output);
        let bytes = self.merge_into(&sources, &temp_path).await?;

        tokio::fs::rename(&temp_path, &self.output)
            .await
            .map_err(|source| ConsolidationError::Finalize {
                path: self.output.clone(),
                source,
            })?;

        self.cleanup(&sources).await?;
        debug!("Wrote {} bytes to {}", bytes, self.output.display());

        Ok(ConsolidationSummary {
            partitions: sources.len(),
            bytes,
        })
    }

    /// `<KEY>.txt` files of the partition directory in ascending key order
    async fn partition_files(&self) -> ConsolidationResult<Vec<(Partition, PathBuf)>> {
        let read_dir_error = |source| ConsolidationError::ReadDir {
            path: self.partition_dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.partition_dir)
            .await
            .map_err(read_dir_error)?;
        let mut sources = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_dir_error)? {
            let path = entry.path();
            if let Some(partition) = partition_of(&path) {
                sources.push((partition, path));
            }
        }

        sources.sort_unstable_by_key(|(partition, _)| *partition);
        Ok(sources)
    }

    async fn merge_into(
        &self,
        sources: &[(Partition, PathBuf)],
        temp_path: &Path,
    ) -> ConsolidationResult<u64> {
        let file = File::create(temp_path)
            .await
            .map_err(|source| ConsolidationError::Create {
                path: temp_path.to_path_buf(),
                source,
            })?;
        let mut writer = BufWriter::with_capacity(files::WRITE_BUFFER_SIZE, file);
        let mut bytes = 0u64;

        for (_, path) in sources {
            let mut input = File::open(path)
                .await
                .map_err(|source| ConsolidationError::Open {
                    path: path.clone(),
                    source,
                })?;
            bytes += tokio::io::copy(&mut input, &mut writer)
                .await
                .map_err(|source| ConsolidationError::Copy {
                    path: path.clone(),
                    source,
                })?;
        }

        let finalize_error = |source| ConsolidationError::Finalize {
            path: temp_path.to_path_buf(),
            source,
        };
        writer.flush().await.map_err(finalize_error)?;
        writer.into_inner().sync_all().await.map_err(finalize_error)?;
        Ok(bytes)
    }

    async fn cleanup(&self, sources: &[(Partition, PathBuf)]) -> ConsolidationResult<()> {
        for (_, path) in sources {
            tokio::fs::remove_file(path)
                .await
                .map_err(|source| ConsolidationError::Cleanup {
                    path: path.clone(),
                    source,
                })?;
        }

        // Stray temp files from abandoned partitions go with the directory
        match tokio::fs::remove_dir_all(&self.partition_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ConsolidationError::Cleanup {
                path: self.partition_dir.clone(),
                source,
            }),
        }
    }
}

/// Partition named by a `<KEY>.txt` path
fn partition_of(path: &Path) -> Option<Partition> {
    if path.extension()? != files::PARTITION_EXTENSION {
        return None;
    }
    Partition::from_key(path.file_stem()?.to_str()?)
}
