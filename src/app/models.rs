//! Data models for HIBP Fetcher
//!
//! This module defines the core data structures used throughout the application:
//! partitions and their keys, partition ranges, hash modes, line shapes, and the
//! per-partition job outcome.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::partitions::{KEY_WIDTH, PARTITION_COUNT};

/// Render a partition id as its 5-digit uppercase hex key
///
/// Ids outside the keyspace are masked into it, so the result is always
/// exactly five characters.
///
/// ```
/// use hibp_fetcher::app::models::to_key;
///
/// assert_eq!(to_key(0), "00000");
/// assert_eq!(to_key(0xABC), "00ABC");
/// assert_eq!(to_key(1_048_575), "FFFFF");
/// ```
pub fn to_key(id: u32) -> String {
    format!("{:05X}", id & (PARTITION_COUNT - 1))
}

/// One shard of the remote dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Partition {
    id: u32,
}

impl Partition {
    /// Create a partition, returning `None` outside `[0, 2^20)`
    pub fn new(id: u32) -> Option<Self> {
        (id < PARTITION_COUNT).then_some(Self { id })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Request key, file stem, and line prefix for this partition
    pub fn key(&self) -> String {
        to_key(self.id)
    }

    /// Output file name, e.g. `0A1B2.txt`
    pub fn file_name(&self) -> String {
        format!(
            "{}.{}",
            self.key(),
            crate::constants::files::PARTITION_EXTENSION
        )
    }

    /// Parse a partition back from a key such as `0A1B2` (case-insensitive)
    pub fn from_key(key: &str) -> Option<Self> {
        if key.len() != KEY_WIDTH || !key.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(key, 16).ok().and_then(Self::new)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05X}", self.id)
    }
}

/// Contiguous run of partitions to download
///
/// Defaults to the whole keyspace. Written as `START..END` with hex keys and an
/// exclusive end, or `START..=END` with an inclusive end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartitionRange {
    start: u32,
    end: u32,
}

impl PartitionRange {
    /// Build a range, clamped to the keyspace
    pub fn new(range: Range<u32>) -> Self {
        let end = range.end.min(PARTITION_COUNT);
        let start = range.start.min(end);
        Self { start, end }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of partitions in the range
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether the range covers all 2^20 partitions
    pub fn is_full(&self) -> bool {
        self.start == 0 && self.end == PARTITION_COUNT
    }

    /// Iterate partitions in ascending key order
    pub fn iter(&self) -> impl Iterator<Item = Partition> {
        (self.start..self.end).map(|id| Partition { id })
    }
}

impl Default for PartitionRange {
    fn default() -> Self {
        Self::new(0..PARTITION_COUNT)
    }
}

impl fmt::Display for PartitionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "{}..{}", to_key(self.start), to_key(self.start));
        }
        write!(f, "{}..={}", to_key(self.start), to_key(self.end - 1))
    }
}

impl FromStr for PartitionRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_key = |key: &str| {
            Partition::from_key(key.trim())
                .map(|p| p.id())
                .ok_or_else(|| format!("'{}' is not a 5-digit hex partition key", key.trim()))
        };

        if let Some((start, end)) = s.split_once("..=") {
            let (start, end) = (parse_key(start)?, parse_key(end)?);
            if end < start {
                return Err(format!("range end {} is before start {}", to_key(end), to_key(start)));
            }
            Ok(Self::new(start..end + 1))
        } else if let Some((start, end)) = s.split_once("..") {
            let start = parse_key(start)?;
            // An exclusive end may name one past FFFFF
            let end = if end.trim().eq_ignore_ascii_case("100000") {
                PARTITION_COUNT
            } else {
                parse_key(end)?
            };
            if end < start {
                return Err(format!("range end {} is before start {}", to_key(end), to_key(start)));
            }
            Ok(Self::new(start..end))
        } else {
            let single = parse_key(s)?;
            Ok(Self::new(single..single + 1))
        }
    }
}

impl TryFrom<String> for PartitionRange {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PartitionRange> for String {
    fn from(range: PartitionRange) -> Self {
        range.to_string()
    }
}

/// Which hash flavour to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMode {
    /// SHA-1 hashes (endpoint default)
    #[default]
    Sha1,
    /// NTLM hashes, requested with `?mode=ntlm`
    Ntlm,
}

impl fmt::Display for HashMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashMode::Sha1 => write!(f, "SHA-1"),
            HashMode::Ntlm => write!(f, "NTLM"),
        }
    }
}

/// On-disk shape of a partition file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineFormat {
    /// Decompressed body written verbatim (suffix-only lines)
    Raw,
    /// Every line prefixed with the partition key, newline-terminated
    Prefixed,
}

/// What happened to a single partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Fetched over the network and written
    Completed,
    /// Already present on disk, no request issued
    Skipped,
    /// Fatal error for this partition
    Failed,
}
