//! Application configuration.
//!
//! Aggregates storage and collection settings into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod collection;
mod storage;

pub use collection::{CollectionConfig, DEFAULT_KEY_COLUMN, DEFAULT_POSITION_FIELD};
pub use storage::{PostgresConfig, SqliteConfig, StorageConfig, StorageType};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "sortable.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "SORTABLE_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "SORTABLE";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "SORTABLE_LOG";

use serde::Deserialize;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Collection {0:?} is not configured")]
    UnknownCollection(String),

    #[error("Collection {0:?} is configured more than once")]
    DuplicateCollection(String),

    #[error("Collection {collection:?} lists group field {field:?} twice")]
    DuplicateGroupField { collection: String, field: String },
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Sortable collections.
    pub collections: Vec<CollectionConfig>,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `sortable.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject duplicate collection names and duplicate group fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, collection) in self.collections.iter().enumerate() {
            if self.collections[..i].iter().any(|c| c.name == collection.name) {
                return Err(ConfigError::DuplicateCollection(collection.name.clone()));
            }
            for (j, field) in collection.group_fields.iter().enumerate() {
                if collection.group_fields[..j].contains(field) {
                    return Err(ConfigError::DuplicateGroupField {
                        collection: collection.name.clone(),
                        field: field.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Settings for the named collection.
    pub fn collection(&self, name: &str) -> Result<&CollectionConfig, ConfigError> {
        self.collections
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ConfigError::UnknownCollection(name.to_string()))
    }

    /// Create config for testing.
    #[cfg(test)]
    pub fn for_test() -> Self {
        Self::default()
    }
}
