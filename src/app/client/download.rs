//! Streamed decompression to disk with atomic writes
//!
//! A range body arrives brotli-compressed. This module decodes it incrementally
//! into a temporary sibling file through a buffered writer and renames it onto
//! the final path only after everything succeeded, so a reader never sees a
//! half-written partition under its final name.

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use futures::{Stream, TryStreamExt};
use tokio_util::bytes::Bytes;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::debug;

use crate::app::models::{LineFormat, Partition};
use crate::constants::files;
use crate::errors::{DownloadError, DownloadResult};

/// Writes decoded partition bodies to disk
pub struct DownloadHandler;

impl DownloadHandler {
    /// Decode a compressed body into `destination`, atomically
    ///
    /// Returns the number of decoded bytes written. On any failure the temporary
    /// file is removed and `destination` is left untouched.
    ///
    /// # Errors
    ///
    /// - `DownloadError::Stream` if reading, decoding, or writing fails
    /// - `DownloadError::AtomicOperationFailed` if the final rename fails
    pub async fn write_partition<S, E>(
        body: S,
        partition: Partition,
        destination: &Path,
        format: LineFormat,
    ) -> DownloadResult<u64>
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let temp_path = temp_path_for(destination);

        let written = match Self::decode_to_file(body, partition, &temp_path, format).await {
            Ok(written) => written,
            Err(e) => {
                remove_temp(&temp_path).await;
                return Err(e);
            }
        };

        if let Err(source) = tokio::fs::rename(&temp_path, destination).await {
            remove_temp(&temp_path).await;
            return Err(DownloadError::AtomicOperationFailed {
                temp_path,
                final_path: destination.to_path_buf(),
                source,
            });
        }

        debug!(
            "Wrote {} ({} bytes decoded)",
            destination.display(),
            written
        );
        Ok(written)
    }

    /// Decode on the blocking pool into `temp_path`, flushing and syncing before return
    async fn decode_to_file<S, E>(
        body: S,
        partition: Partition,
        temp_path: &Path,
        format: LineFormat,
    ) -> DownloadResult<u64>
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let key = partition.key();
        let reader = StreamReader::new(Box::pin(
            body.map_err(|e| io::Error::new(io::ErrorKind::Other, e)),
        ));
        // Must be created inside the runtime; used from the blocking thread below
        let bridge = SyncIoBridge::new(reader);
        let temp_path = temp_path.to_path_buf();

        tokio::task::spawn_blocking(move || -> DownloadResult<u64> {
            let stream_error = |source: io::Error| DownloadError::Stream {
                key: key.clone(),
                source,
            };

            let file = std::fs::File::create(&temp_path).map_err(stream_error)?;
            let mut writer = BufWriter::with_capacity(files::WRITE_BUFFER_SIZE, file);
            let mut decoder = brotli::Decompressor::new(bridge, files::DECODE_BUFFER_SIZE);

            let written = match format {
                LineFormat::Raw => io::copy(&mut decoder, &mut writer),
                LineFormat::Prefixed => {
                    copy_prefixed(BufReader::new(decoder), &mut writer, key.as_bytes())
                }
            }
            .map_err(stream_error)?;

            let file = writer
                .into_inner()
                .map_err(|e| stream_error(e.into_error()))?;
            file.sync_all().map_err(stream_error)?;
            Ok(written)
        })
        .await
        .map_err(|e| DownloadError::TaskFailed {
            reason: e.to_string(),
        })?
    }
}

/// Copy lines, writing `prefix` before each one
///
/// Range bodies end their lines with `\r\n` and omit the terminator on the
/// last line. A missing terminator is filled in with the ending of the line
/// before it (`\r\n` for a single line), so merged output never mixes endings.
fn copy_prefixed<R: BufRead, W: Write>(mut reader: R, writer: &mut W, prefix: &[u8]) -> io::Result<u64> {
    let mut line = Vec::with_capacity(64);
    let mut written = 0u64;
    let mut ending: &[u8] = b"\r\n";

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        writer.write_all(prefix)?;
        writer.write_all(&line)?;
        written += (prefix.len() + line.len()) as u64;

        if line.ends_with(b"\r\n") {
            ending = b"\r\n";
        } else if line.ends_with(b"\n") {
            ending = b"\n";
        } else {
            writer.write_all(ending)?;
            written += ending.len() as u64;
        }
    }

    Ok(written)
}

/// `<name>.tmp` next to the destination
pub fn temp_path_for(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(files::TEMP_FILE_SUFFIX);
    destination.with_file_name(name)
}

async fn remove_temp(temp_path: &Path) {
    if let Err(e) = tokio::fs::remove_file(temp_path).await {
        if e.kind() != io::ErrorKind::NotFound {
            debug!("Could not remove {}: {}", temp_path.display(), e);
        }
    }
}

/// Brotli-compress a buffer the way the range endpoint does
#[cfg(test)]
pub(crate) fn brotli_compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 5, 22);
        writer.write_all(data).unwrap();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, StreamExt};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::sync::Notify;

    fn body(chunks: Vec<Vec<u8>>) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static {
        stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
    }

    /// Split compressed data into small chunks to exercise incremental decoding
    fn chunked(data: Vec<u8>, size: usize) -> Vec<Vec<u8>> {
        data.chunks(size).map(|c| c.to_vec()).collect()
    }

    fn partition(key: &str) -> Partition {
        Partition::from_key(key).unwrap()
    }

    #[test]
    fn test_temp_path_generation() {
        let temp = temp_path_for(Path::new("/tmp/out/0A1B2.txt"));
        assert_eq!(temp, PathBuf::from("/tmp/out/0A1B2.txt.tmp"));
    }

    #[tokio::test]
    async fn test_raw_write_is_verbatim() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("00000.txt");
        let plain = b"0005AD76BD555C1D6D771DE417A4B87E4B4:10\r\n000A8DAE4228F821FB418F59826079BF368:4";
        let compressed = brotli_compress(plain);

        let written = DownloadHandler::write_partition(
            body(chunked(compressed, 7)),
            partition("00000"),
            &destination,
            LineFormat::Raw,
        )
        .await
        .unwrap();

        assert_eq!(written, plain.len() as u64);
        assert_eq!(std::fs::read(&destination).unwrap(), plain.to_vec());
        assert!(!temp_path_for(&destination).exists());
    }

    #[tokio::test]
    async fn test_prefixed_write_adds_key_and_final_line_ending() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("ABCDE.txt");
        let compressed = brotli_compress(b"111:1\r\n222:2");

        DownloadHandler::write_partition(
            body(vec![compressed]),
            partition("ABCDE"),
            &destination,
            LineFormat::Prefixed,
        )
        .await
        .unwrap();

        let content = std::fs::read_to_string(&destination).unwrap();
        assert_eq!(content, "ABCDE111:1\r\nABCDE222:2\r\n");
    }

    #[tokio::test]
    async fn test_corrupt_body_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("00001.txt");

        let result = DownloadHandler::write_partition(
            body(vec![b"definitely not brotli".to_vec()]),
            partition("00001"),
            &destination,
            LineFormat::Raw,
        )
        .await;

        assert!(matches!(result, Err(DownloadError::Stream { .. })));
        assert!(!destination.exists());
        assert!(!temp_path_for(&destination).exists());
    }

    #[tokio::test]
    async fn test_truncated_body_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("00002.txt");
        let plain: Vec<u8> = (0..5000)
            .flat_map(|i| format!("{:035X}:{}\r\n", i, i).into_bytes())
            .collect();
        let mut compressed = brotli_compress(&plain);
        compressed.truncate(compressed.len() / 2);

        let result = DownloadHandler::write_partition(
            body(vec![compressed]),
            partition("00002"),
            &destination,
            LineFormat::Raw,
        )
        .await;

        assert!(result.is_err());
        assert!(!destination.exists());
        assert!(!temp_path_for(&destination).exists());
    }

    #[tokio::test]
    async fn test_body_error_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("00003.txt");
        let compressed = brotli_compress(b"abc:1\r\n");
        let failing = stream::iter(vec![
            Ok(Bytes::from(compressed[..2].to_vec())),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ]);

        let result = DownloadHandler::write_partition(
            failing,
            partition("00003"),
            &destination,
            LineFormat::Raw,
        )
        .await;

        assert!(matches!(result, Err(DownloadError::Stream { .. })));
        assert!(!destination.exists());
        assert!(!temp_path_for(&destination).exists());
    }

    #[tokio::test]
    async fn test_overwrites_existing_destination_atomically() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("00004.txt");
        std::fs::write(&destination, "stale").unwrap();

        DownloadHandler::write_partition(
            body(vec![brotli_compress(b"fresh:1\n")]),
            partition("00004"),
            &destination,
            LineFormat::Raw,
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "fresh:1\n");
    }

    #[test]
    fn test_copy_prefixed_keeps_line_endings_uniform() {
        let mut out = Vec::new();
        let written = copy_prefixed(&b"AA:1\nBB:2"[..], &mut out, b"12345").unwrap();
        assert_eq!(out, b"12345AA:1\n12345BB:2\n".to_vec());
        assert_eq!(written, out.len() as u64);

        let mut out = Vec::new();
        copy_prefixed(&b"CC:3"[..], &mut out, b"12345").unwrap();
        assert_eq!(out, b"12345CC:3\r\n".to_vec());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_final_path_absent_while_body_in_flight() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("00005.txt");
        let temp = temp_path_for(&destination);
        let plain: Vec<u8> = (0..2000)
            .flat_map(|i| format!("{:035X}:{}\r\n", i, i).into_bytes())
            .collect();
        let compressed = brotli_compress(&plain);
        let (head, tail) = compressed.split_at(compressed.len() / 2);
        let (head, tail) = (Bytes::from(head.to_vec()), Bytes::from(tail.to_vec()));

        let release = Arc::new(Notify::new());
        let gate = Arc::clone(&release);
        let paused = stream::once(async move { Ok::<_, io::Error>(head) }).chain(stream::once(
            async move {
                gate.notified().await;
                Ok(tail)
            },
        ));

        let task = tokio::spawn({
            let destination = destination.clone();
            async move {
                DownloadHandler::write_partition(
                    paused,
                    partition("00005"),
                    &destination,
                    LineFormat::Raw,
                )
                .await
            }
        });

        for _ in 0..200 {
            if temp.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(temp.exists());
        assert!(!destination.exists());

        release.notify_one();
        let written = task.await.unwrap().unwrap();

        assert_eq!(written, plain.len() as u64);
        assert_eq!(std::fs::read(&destination).unwrap(), plain);
        assert!(!temp.exists());
    }

    #[test]
    fn test_copy_prefixed_empty_input() {
        let mut out = Vec::new();
        let written = copy_prefixed(&b""[..], &mut out, b"00000").unwrap();
        assert_eq!(written, 0);
        assert!(out.is_empty());
    }
}
