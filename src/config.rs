//! Configuration management for HIBP Fetcher
//!
//! Settings come from, in increasing precedence: built-in defaults, a TOML file,
//! and command-line flags. The file is optional; when `--config` is not given
//! the first of `./hibp-fetcher.toml` and `<config dir>/hibp-fetcher/config.toml`
//! that exists is used.
//!
//! ```toml
//! [client]
//! base_url = "https://api.pwnedpasswords.com/range/"
//! request_timeout = "60s"
//!
//! [client.retry]
//! max_attempts = 10
//! initial_interval = "100ms"
//!
//! [download]
//! parallelism = 32
//! failure_policy = "fail-fast"
//! hash_mode = "sha1"
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{ClientConfig, CoordinatorConfig};
use crate::constants::files;
use crate::errors::{ConfigError, ConfigResult};

/// File-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP client and retry settings
    pub client: ClientConfig,
    /// Run settings
    pub download: CoordinatorConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Crate log level used when no verbosity flag is given
    pub level: Option<String>,
}

impl AppConfig {
    /// Load configuration from the override path or the standard locations
    ///
    /// # Errors
    ///
    /// - `ConfigError::Read` if an explicitly given file is missing or unreadable
    /// - `ConfigError::InvalidFormat` for malformed TOML
    /// - `ConfigError::InvalidValue` for out-of-range values
    pub async fn load(config_file_override: Option<&Path>) -> ConfigResult<Self> {
        let path = match config_file_override {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_file(),
        };

        let config = match path {
            Some(path) => Self::load_from_file(&path).await?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// First existing file among the standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(files::CONFIG_FILE_NAME)];
        if let Some(path) = Self::default_config_path() {
            search_paths.push(path);
        }

        search_paths.into_iter().find(|path| {
            let found = path.is_file();
            if found {
                debug!("Found config file: {}", path.display());
            }
            found
        })
    }

    /// `<config dir>/hibp-fetcher/config.toml` for the current user
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(files::CONFIG_DIR_NAME).join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig =
            toml::from_str(&content).map_err(|source| ConfigError::InvalidFormat {
                path: path.to_path_buf(),
                source,
            })?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Reject values the run could not honour
    pub fn validate(&self) -> ConfigResult<()> {
        if self.client.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "client.retry.max_attempts".to_string(),
                value: "0".to_string(),
                reason: "At least one attempt is required".to_string(),
            });
        }

        if self.client.retry.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "client.retry.multiplier".to_string(),
                value: self.client.retry.multiplier.to_string(),
                reason: "Backoff must not shrink between attempts".to_string(),
            });
        }

        if let Err(e) = self.client.parsed_base_url() {
            return Err(ConfigError::InvalidValue {
                field: "client.base_url".to_string(),
                value: self.client.base_url.clone(),
                reason: e.to_string(),
            });
        }

        Ok(())
    }
}
