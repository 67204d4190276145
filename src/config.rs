//! Configuration management for event schemas
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (event-schemas.toml)
//! - Environment variables (EVENT_SCHEMAS__*)
//!
//! ## Example config file (event-schemas.toml):
//! ```toml
//! [registry]
//! name = "discovered-schemas"
//! prefix = "com.example."
//!
//! [directory]
//! path = "./schemas"
//! page_size = 100
//!
//! [events]
//! bus_name = "default"
//! standard_resources = ["event-schemas"]
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::bus::{DEFAULT_BUS, STANDARD_RESOURCES};
use crate::registry::DEFAULT_REGISTRY;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSchemasConfig {
    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub events: EventsConfig,
}

/// Which registry the store reads and writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_name")]
    pub name: String,

    /// Only schemas whose name starts with this are loaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// Filesystem directory settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_directory_path")]
    pub path: PathBuf,

    /// Entries per listing page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

/// Event publishing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_bus_name")]
    pub bus_name: String,

    /// Resources attached to every published event
    #[serde(default = "default_standard_resources")]
    pub standard_resources: Vec<String>,
}

fn default_registry_name() -> String {
    DEFAULT_REGISTRY.to_string()
}

fn default_directory_path() -> PathBuf {
    PathBuf::from("./schemas")
}

fn default_page_size() -> usize {
    100
}

fn default_bus_name() -> String {
    DEFAULT_BUS.to_string()
}

fn default_standard_resources() -> Vec<String> {
    STANDARD_RESOURCES.iter().map(|r| r.to_string()).collect()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name: default_registry_name(),
            prefix: None,
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            path: default_directory_path(),
            page_size: default_page_size(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            bus_name: default_bus_name(),
            standard_resources: default_standard_resources(),
        }
    }
}

impl EventSchemasConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering `config_path` over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "event-schemas.toml",
            ".event-schemas.toml",
            "config/event-schemas.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "event-schemas", "event-schemas") {
            let xdg_config = config_dir.config_dir().join("event-schemas.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // EVENT_SCHEMAS__REGISTRY__NAME=...
        builder = builder.add_source(
            Environment::with_prefix("EVENT_SCHEMAS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Directory path, resolved against the working directory when relative
    pub fn directory_path(&self) -> PathBuf {
        if self.directory.path.is_absolute() {
            self.directory.path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.directory.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EventSchemasConfig::default();
        assert_eq!(config.registry.name, "discovered-schemas");
        assert!(config.registry.prefix.is_none());
        assert_eq!(config.directory.page_size, 100);
        assert_eq!(config.events.standard_resources, vec!["event-schemas".to_string()]);
    }

    #[test]
    fn test_serialize_config() {
        let config = EventSchemasConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[registry]"));
        assert!(toml_str.contains("[directory]"));
        assert!(toml_str.contains("[events]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: EventSchemasConfig = toml::from_str(
            r#"
            [registry]
            name = "TAPI-TEST"
            "#,
        )
        .unwrap();
        assert_eq!(config.registry.name, "TAPI-TEST");
        assert_eq!(config.events.bus_name, "default");
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let path = path.to_str().unwrap();

        let mut config = EventSchemasConfig::default();
        config.registry.prefix = Some("com.example.".to_string());
        config.directory.page_size = 7;
        config.save(path).unwrap();

        let loaded = EventSchemasConfig::load_from(Some(path)).unwrap();
        assert_eq!(loaded.registry.prefix.as_deref(), Some("com.example."));
        assert_eq!(loaded.directory.page_size, 7);
    }
}
