//! Application constants for HIBP Fetcher
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Have I Been Pwned range API endpoints and headers
pub mod hibp {
    /// Base URL of the range API; the partition key is appended to it
    pub const BASE_URL: &str = "https://api.pwnedpasswords.com/range/";

    /// Query appended to fetch NTLM hashes instead of SHA-1
    pub const NTLM_QUERY: &str = "mode=ntlm";

    /// Cloudflare edge cache status response header
    pub const CACHE_STATUS_HEADER: &str = "Cf-Cache-Status";

    /// Cache status value that counts as an edge hit
    pub const CACHE_HIT: &str = "HIT";

    /// Content encoding requested from the endpoint
    pub const ACCEPT_ENCODING: &str = "br";
}

/// Partition keyspace
pub mod partitions {
    /// Number of hex digits in a partition key
    pub const KEY_WIDTH: usize = 5;

    /// Total number of partitions (16^5)
    pub const PARTITION_COUNT: u32 = 1 << 20;
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "hibp-downloader";

    /// Overall request timeout, body included
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
}

/// Retry configuration
pub mod limits {
    use super::Duration;

    /// Total attempts per partition, the first one included
    pub const MAX_ATTEMPTS: u32 = 10;

    /// First backoff interval
    pub const RETRY_INITIAL_INTERVAL: Duration = Duration::from_millis(100);

    /// Upper bound for a single backoff interval
    pub const RETRY_MAX_INTERVAL: Duration = Duration::from_secs(10);

    /// Backoff growth factor
    pub const RETRY_MULTIPLIER: f64 = 2.0;
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic operations
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Extension of per-partition output files
    pub const PARTITION_EXTENSION: &str = "txt";

    /// Prefix of the hidden partition directory used in single-file mode
    pub const PARTITION_DIR_PREFIX: &str = ".hibp_";

    /// Default output file or folder
    pub const DEFAULT_OUTPUT: &str = "hibp-passwords.txt";

    /// Buffered writer capacity for partition files (32KB)
    pub const WRITE_BUFFER_SIZE: usize = 32 * 1024;

    /// Buffer size handed to the brotli decoder
    pub const DECODE_BUFFER_SIZE: usize = 4 * 1024;

    /// Project-local configuration file name
    pub const CONFIG_FILE_NAME: &str = "hibp-fetcher.toml";

    /// Directory name under the user config dir
    pub const CONFIG_DIR_NAME: &str = "hibp-fetcher";
}

/// Worker and concurrency configuration
pub mod workers {
    /// Workers per available CPU when parallelism is not given
    pub const WORKERS_PER_CPU: usize = 8;

    /// Hard cap on concurrent workers
    pub const MAX_WORKER_COUNT: usize = 64;
}

// Re-export commonly used constants for convenience
pub use files::TEMP_FILE_SUFFIX;
pub use http::USER_AGENT;
pub use limits::MAX_ATTEMPTS;
pub use partitions::PARTITION_COUNT;
