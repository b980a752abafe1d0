//! Link configuration.
//!
//! Loaded from YAML, with an environment overlay for the validation bypass.

use std::path::Path;
use std::time::Duration;

use impload_mission::{Validator, DEFAULT_CAPACITY};
use serde::{Deserialize, Serialize};

use crate::error::LinkError;

/// Environment variable that disables mission validation when set.
pub const NO_VERIFY_ENV: &str = "IMPLOAD_NO_VERIFY";

/// Link configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    /// How long a request waits for its reply.
    pub request_timeout_ms: u64,
    /// Transport read timeout; bounds how quickly the receiver notices shutdown.
    pub read_timeout_ms: u64,
    /// Validator capacity until the flight controller reports its own.
    pub default_capacity: usize,
    /// Let every mission pass validation.
    pub skip_validation: bool,
    /// RFCOMM channel for Bluetooth devices.
    pub bluetooth_channel: u8,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5000,
            read_timeout_ms: 100,
            default_capacity: DEFAULT_CAPACITY,
            skip_validation: false,
            bluetooth_channel: 1,
        }
    }
}

impl LinkConfig {
    /// Parse YAML configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self, LinkError> {
        serde_yaml::from_str(yaml).map_err(|e| LinkError::Config(e.to_string()))
    }

    /// Load YAML configuration from a file.
    pub fn load(path: &Path) -> Result<Self, LinkError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LinkError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&text)
    }

    /// Apply environment overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(value) = std::env::var(NO_VERIFY_ENV) {
            if env_flag(&value) {
                self.skip_validation = true;
            }
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Validator for `capacity` items honouring `skip_validation`.
    pub fn validator(&self, capacity: usize) -> Validator {
        Validator::new(capacity).with_bypass(self.skip_validation)
    }
}

fn env_flag(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.default_capacity, 120);
        assert_eq!(config.bluetooth_channel, 1);
        assert!(!config.skip_validation);
    }

    #[test]
    fn test_partial_yaml() {
        let config = LinkConfig::from_yaml("request_timeout_ms: 250\nskip_validation: true\n").unwrap();
        assert_eq!(config.request_timeout_ms, 250);
        assert!(config.skip_validation);
        assert_eq!(config.read_timeout_ms, 100);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            LinkConfig::from_yaml("request_timeout: 5\n"),
            Err(LinkError::Config(_))
        ));
    }

    #[test]
    fn test_env_flag_values() {
        assert!(env_flag("1"));
        assert!(env_flag("yes"));
        assert!(!env_flag(""));
        assert!(!env_flag("0"));
        assert!(!env_flag("FALSE"));
    }

    #[test]
    #[serial]
    fn test_env_overlay() {
        std::env::set_var(NO_VERIFY_ENV, "1");
        let config = LinkConfig::default().with_env();
        std::env::remove_var(NO_VERIFY_ENV);
        assert!(config.skip_validation);
        assert!(config.validator(120).is_bypassed());

        let config = LinkConfig::default().with_env();
        assert!(!config.skip_validation);
    }

    #[test]
    #[serial]
    fn test_load_file() {
        let path = std::env::temp_dir().join(format!("impload-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "default_capacity: 60\n").unwrap();
        let config = LinkConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.default_capacity, 60);

        assert!(matches!(LinkConfig::load(&path), Err(LinkError::Config(_))));
    }
}
