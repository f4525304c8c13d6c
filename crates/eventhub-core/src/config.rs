//! Configuration for the event bus
//!
//! Provides [`EventBusConfig`] with defaults, validation, and file handling.
//! Configuration files may be JSON or TOML, selected by extension.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConfigError, Result};

/// Configuration for the event bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Capacity of each event type's merged output channel.
    ///
    /// Receivers that fall further behind skip the oldest values.
    pub channel_capacity: usize,
    /// Emit diagnostic warnings (duplicate registrations, unheard dispatches).
    pub dev_mode: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            dev_mode: cfg!(debug_assertions),
        }
    }
}

impl EventBusConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style toggle for dev mode
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = match ConfigFormat::of(path)? {
            ConfigFormat::Json => {
                serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                    format: "json".to_string(),
                    reason: e.to_string(),
                })?
            }
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| ConfigError::Parse {
                format: "toml".to_string(),
                reason: e.to_string(),
            })?,
        };

        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded event bus config");
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = match ConfigFormat::of(path)? {
            ConfigFormat::Json => {
                serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
                    format: "json".to_string(),
                    reason: e.to_string(),
                })?
            }
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
                    format: "toml".to_string(),
                    reason: e.to_string(),
                })?
            }
        };

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "channel_capacity".to_string(),
                reason: "must be > 0".to_string(),
            });
        }

        Ok(())
    }
}

enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    fn of(path: &Path) -> std::result::Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_default_config_is_valid() {
        let config = EventBusConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.channel_capacity, 1024);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = EventBusConfig {
            channel_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "channel_capacity"
        ));
    }

    #[test]
    fn test_json_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bus.json");

        let config = EventBusConfig {
            channel_capacity: 64,
            dev_mode: true,
        };
        config.save_to_file(&path).unwrap();

        let loaded = EventBusConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bus.toml");
        std::fs::write(&path, "dev_mode = false\n").unwrap();

        let loaded = EventBusConfig::load_from_file(&path).unwrap();
        assert!(!loaded.dev_mode);
        assert_eq!(loaded.channel_capacity, 1024);
    }

    #[test]
    fn test_invalid_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bus.toml");
        std::fs::write(&path, "channel_capacity = 0\n").unwrap();
        assert!(EventBusConfig::load_from_file(&path).is_err());

        let path = dir.path().join("bus.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = EventBusConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bus.yaml");
        std::fs::write(&path, "dev_mode: true").unwrap();

        let err = EventBusConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::UnsupportedFormat { .. })
        ));
    }
}
