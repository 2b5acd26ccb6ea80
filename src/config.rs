//! Persisted user configuration.
//!
//! Configuration is stored as one TOML file per identifier under a
//! configuration root directory (`./config` by default). The store itself is
//! schema-agnostic: any `serde` record can be saved under any identifier.
//! The main application keeps its own settings under `"core"`:
//!
//! ```toml
//! filter = ".*\\.(png|webp)$"
//! zoom = 1.44
//! log_level = "info"
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration root, relative to the working directory.
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Identifier of the application's own configuration record.
pub const CORE_CONFIG_ID: &str = "core";

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration has been saved under this identifier yet.
    #[error("Configuration '{identifier}' not found at {}", path.display())]
    NotFound { identifier: String, path: PathBuf },

    /// The configuration root exists but is not a directory.
    #[error("Configuration root {} must be a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// The stored file is not valid TOML for the requested type.
    #[error("Invalid configuration in {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// The value could not be serialized.
    #[error("Could not serialize configuration '{identifier}': {reason}")]
    Serialize { identifier: String, reason: String },

    /// IO error while reading or writing configuration.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A directory of named configuration records.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    /// Opens a configuration root, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotADirectory` if `root` exists but is a file.
    pub fn open(root: impl Into<PathBuf>) -> ConfigResult<Self> {
        let root = root.into();
        if root.exists() {
            if !root.is_dir() {
                return Err(ConfigError::NotADirectory { path: root });
            }
        } else {
            fs::create_dir_all(&root).map_err(|e| ConfigError::Io {
                path: root.clone(),
                source: e,
            })?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, identifier: &str) -> PathBuf {
        self.root.join(format!("{}.toml", identifier))
    }

    /// Loads the record stored under `identifier`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if nothing was saved under `identifier`.
    /// Returns `ConfigError::Parse` if the file does not deserialize into `T`.
    pub fn load<T: DeserializeOwned>(&self, identifier: &str) -> ConfigResult<T> {
        let path = self.path_for(identifier);
        if !path.exists() {
            return Err(ConfigError::NotFound {
                identifier: identifier.to_string(),
                path,
            });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path,
            reason: e.to_string(),
        })
    }

    /// Saves `value` under `identifier`, replacing any previous value.
    pub fn save<T: Serialize>(&self, identifier: &str, value: &T) -> ConfigResult<()> {
        let content = toml::to_string_pretty(value).map_err(|e| ConfigError::Serialize {
            identifier: identifier.to_string(),
            reason: e.to_string(),
        })?;

        let path = self.path_for(identifier);
        fs::write(&path, content).map_err(|e| ConfigError::Io { path, source: e })
    }
}

/// Settings of the application itself, stored under `"core"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Regex applied to source file names.
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Preview zoom factor.
    #[serde(default = "default_zoom")]
    pub zoom: f32,

    /// Default `tracing` filter directive when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_filter() -> String {
    crate::assignment::DEFAULT_FILTER.to_string()
}

fn default_zoom() -> f32 {
    1.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            zoom: default_zoom(),
            log_level: default_log_level(),
        }
    }
}

impl CoreConfig {
    /// Loads the core record, falling back to defaults if none was saved yet.
    ///
    /// # Errors
    ///
    /// Only errors other than `NotFound` are returned.
    pub fn load_or_default(store: &ConfigStore) -> ConfigResult<Self> {
        match store.load(CORE_CONFIG_ID) {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, store: &ConfigStore) -> ConfigResult<()> {
        store.save(CORE_CONFIG_ID, self)
    }
}
