//! Configuration loading traits and types.
//!
//! Every process touching a simulator namespace is configured from a TOML
//! file holding a `[shared]` table (logging, service name) and a `[shm]`
//! table (where namespaces live and how clients poll for responses).
//!
//! # Usage
//!
//! ```rust,no_run
//! use gz_common::config::{ConfigError, ConfigLoader, SharedConfig, ShmConfig};
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Debug, Deserialize)]
//! struct ViewerConfig {
//!     shared: SharedConfig,
//!     #[serde(default)]
//!     shm: ShmConfig,
//! }
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = ViewerConfig::load(Path::new("viewer.toml"))?;
//!     config.shm.validate()?;
//!     println!("namespaces under {}", config.shm.root.display());
//!     Ok(())
//! }
//! ```

use crate::consts::DEFAULT_SHM_ROOT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Every lock, post and ring operation.
    Trace,
    /// Segment lifecycle events.
    Debug,
    /// Server and client lifecycle.
    #[default]
    Info,
    /// Reclaimed segments, skipped ticks.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared by every simulator-side process.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "gz-monitor"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shared memory namespace configuration.
///
/// Replaces fixed process-wide keys: the server id is combined with `root`
/// to derive the namespace directory, and every process that wants to meet
/// in that namespace must agree on `root`.
///
/// # TOML Example
///
/// ```toml
/// [shm]
/// root = "/dev/shm"
/// response_timeout_ms = 3000
/// poll_interval_us = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShmConfig {
    /// Directory holding the `gz-<server_id>` namespace directories.
    pub root: PathBuf,

    /// How long a simulation query waits for its response.
    pub response_timeout_ms: u64,

    /// Sleep between polls of the simulation response ring.
    pub poll_interval_us: u64,
}

impl Default for ShmConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_SHM_ROOT),
            response_timeout_ms: 3000,
            poll_interval_us: 1000,
        }
    }
}

impl ShmConfig {
    /// Configuration rooted at `root` with default timings.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Response timeout as a [`Duration`].
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `root` is empty or relative
    /// - `response_timeout_ms` or `poll_interval_us` is zero
    /// - the poll interval is longer than the response timeout
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root.as_os_str().is_empty() || !self.root.is_absolute() {
            return Err(ConfigError::ValidationError(format!(
                "shm root must be an absolute path, got {:?}",
                self.root
            )));
        }
        if self.response_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "response_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.poll_interval_us == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_us must be > 0".to_string(),
            ));
        }
        if self.poll_interval() > self.response_timeout() {
            return Err(ConfigError::ValidationError(
                "poll_interval_us exceeds response_timeout_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// Blanket-implemented for every `serde::de::DeserializeOwned` type.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
