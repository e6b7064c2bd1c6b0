//! Pipeline configuration, read from TOML.
//!
//! ```toml
//! app_id = "com.example.app"
//! cache_dir = "/var/cache/inbound"
//! cache_key = "propositions"
//!
//! [logging]
//! level = "debug"
//! json = true
//! ```
//!
//! Every field is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use inbound_interchange::Surface;
use inbound_storage::{FileCache, PROPOSITIONS_KEY};

pub const DEFAULT_APP_ID: &str = "inbound";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Application id used to build default surfaces.
    pub app_id: String,
    /// Directory for the durable proposition cache. No cache when unset.
    pub cache_dir: Option<PathBuf>,
    /// Key the in-app snapshot is stored under.
    pub cache_key: String,
    pub logging: LoggingConfig,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `INBOUND_LOG` overrides it.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
            cache_dir: None,
            cache_key: PROPOSITIONS_KEY.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json: false,
        }
    }
}

// ── Functions ─────────────────────────────────────────────────────────────────

impl PipelineConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: PipelineConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_id.trim().is_empty() {
            return Err(ConfigError::Invalid("app_id must not be empty".to_string()));
        }
        if self.cache_key.is_empty() || self.cache_key.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "cache_key '{}' must be a plain file name",
                self.cache_key
            )));
        }
        Ok(())
    }

    /// `mobileapp://<app_id>`.
    pub fn default_surface(&self) -> Surface {
        Surface::for_app(&self.app_id)
    }

    /// The file cache under `cache_dir`, if one is configured.
    pub fn file_cache(&self) -> Option<FileCache> {
        self.cache_dir.as_ref().map(FileCache::new)
    }
}
