//! Monitor configuration.

use gz_common::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig, ShmConfig};
use serde::Deserialize;
use std::path::Path;

/// Complete monitor configuration file.
///
/// ```toml
/// [shared]
/// log_level = "info"
/// service_name = "gz-monitor"
///
/// [shm]
/// root = "/dev/shm"
///
/// [monitor]
/// server_id = 0
/// simulation_id = "default::sim"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Logging and service name.
    pub shared: SharedConfig,
    /// Namespace location and query timings.
    #[serde(default)]
    pub shm: ShmConfig,
    /// Which namespace and simulation interface to talk to.
    #[serde(default)]
    pub monitor: MonitorSection,
}

/// `[monitor]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    /// Server id of the namespace.
    pub server_id: u32,
    /// Id of the simulation interface.
    pub simulation_id: String,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            server_id: 0,
            simulation_id: "default::sim".to_string(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig {
                log_level: LogLevel::Info,
                service_name: "gz-monitor".to_string(),
            },
            shm: ShmConfig::default(),
            monitor: MonitorSection::default(),
        }
    }
}

impl MonitorConfig {
    /// Load from `path`, or use defaults when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.shm.validate()?;
        if self.monitor.simulation_id.is_empty() {
            return Err(ConfigError::ValidationError(
                "monitor.simulation_id cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let config = MonitorConfig::load_or_default(None).unwrap();
        assert_eq!(config.monitor.server_id, 0);
        assert_eq!(config.shared.service_name, "gz-monitor");
    }

    #[test]
    fn loads_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[shared]
log_level = "debug"
service_name = "bench-monitor"

[shm]
root = "/tmp/gz"
response_timeout_ms = 500

[monitor]
server_id = 4
"#
        )
        .unwrap();

        let config = MonitorConfig::load_or_default(Some(file.path())).unwrap();
        assert_eq!(config.shared.log_level, LogLevel::Debug);
        assert_eq!(config.shm.response_timeout_ms, 500);
        assert_eq!(config.shm.poll_interval_us, 1000);
        assert_eq!(config.monitor.server_id, 4);
        assert_eq!(config.monitor.simulation_id, "default::sim");
    }

    #[test]
    fn rejects_empty_simulation_id() {
        let mut config = MonitorConfig::default();
        config.monitor.simulation_id.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
