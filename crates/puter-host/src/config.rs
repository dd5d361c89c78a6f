//! Host configuration.
//!
//! The host reads its device list from YAML:
//!
//! ```yaml
//! devices:
//!   - id: light_controller
//!     address: 127.0.0.1:7000
//!     baud: 115200
//!     timeout_ms: 1500
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::error::{HostError, HostResult};

/// Default serial baud rate.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Default time to wait for a response.
pub const DEFAULT_TIMEOUT_MS: u64 = 1500;

fn default_baud() -> u32 {
    DEFAULT_BAUD
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// One device the host talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device identifier used by the host.
    pub id: String,
    /// Address of the device's serial stream (`host:port`).
    pub address: String,
    /// Serial baud rate of the device.
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Response timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl DeviceConfig {
    /// Create a device entry with default baud and timeout.
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        DeviceConfig {
            id: id.into(),
            address: address.into(),
            baud: DEFAULT_BAUD,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Response timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Host configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Devices to connect to.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

impl HostConfig {
    /// Check that device ids are unique and non-empty.
    pub fn validate(&self) -> HostResult<()> {
        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.id.is_empty() {
                return Err(HostError::Config("device id must not be empty".to_string()));
            }
            if device.timeout_ms == 0 {
                return Err(HostError::Config(format!(
                    "device {}: timeout_ms must be positive",
                    device.id
                )));
            }
            if !seen.insert(device.id.as_str()) {
                return Err(HostError::Config(format!("duplicate device id: {}", device.id)));
            }
        }
        Ok(())
    }

    /// Find a device entry by id.
    pub fn device(&self, id: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.id == id)
    }
}

/// Load and validate host configuration from a YAML file.
pub fn load_host_config(path: impl AsRef<Path>) -> HostResult<HostConfig> {
    let text = std::fs::read_to_string(path)?;
    load_host_config_from_str(&text)
}

/// Load and validate host configuration from a YAML string.
pub fn load_host_config_from_str(text: &str) -> HostResult<HostConfig> {
    let config: HostConfig = serde_yaml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_with_defaults() {
        let config = load_host_config_from_str(
            "devices:\n  - id: light_controller\n    address: 127.0.0.1:7000\n",
        )
        .unwrap();
        let device = config.device("light_controller").unwrap();
        assert_eq!(device.baud, DEFAULT_BAUD);
        assert_eq!(device.timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_load_explicit_values() {
        let yaml = r#"
devices:
  - id: a
    address: 10.0.0.1:7000
    baud: 9600
    timeout_ms: 250
  - id: b
    address: 10.0.0.2:7000
"#;
        let config = load_host_config_from_str(yaml).unwrap();
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].baud, 9600);
        assert_eq!(config.devices[0].timeout_ms, 250);
        assert!(config.device("c").is_none());
    }

    #[test]
    fn test_empty_config() {
        let config = load_host_config_from_str("{}").unwrap();
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let yaml = "devices:\n  - {id: a, address: x}\n  - {id: a, address: y}\n";
        assert!(matches!(
            load_host_config_from_str(yaml),
            Err(HostError::Config(msg)) if msg.contains("duplicate")
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let yaml = "devices:\n  - {id: a, address: x, timeout_ms: 0}\n";
        assert!(matches!(load_host_config_from_str(yaml), Err(HostError::Config(_))));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            load_host_config_from_str("devices: [unterminated"),
            Err(HostError::Yaml(_))
        ));
    }
}
