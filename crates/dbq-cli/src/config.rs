//! Configuration for dbq-inspect
//!
//! Loads configuration from:
//! 1. dbq.yaml - check limits, schema location, logging
//! 2. .env file - loaded by `main` before anything else
//!
//! Environment variables always override dbq.yaml values.

use dbq_ir::Limits;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {var}: {value}")]
    InvalidEnvVar { var: &'static str, value: String },
}

/// Bounds applied when specs are checked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Maximum predicate depth; unbounded when absent
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Maximum number of joins per spec
    #[serde(default)]
    pub max_joins: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// YAML or JSON collection schema file
    #[serde(default)]
    pub schema_path: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: console, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
            output: "console".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub builder: BuilderConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            return Self::load(path);
        }
        let mut config = Config::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(depth) = env_usize("DBQ_MAX_DEPTH")? {
            self.builder.max_depth = Some(depth);
        }
        if let Some(joins) = env_usize("DBQ_MAX_JOINS")? {
            self.builder.max_joins = Some(joins);
        }
        if let Ok(path) = std::env::var("DBQ_SCHEMA_PATH") {
            self.registry.schema_path = Some(path);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }

        Ok(())
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_depth: self.builder.max_depth,
            max_joins: self.builder.max_joins,
        }
    }

    /// Set logging environment variables for the logging module
    pub fn apply_logging_env(&self) {
        std::env::set_var("RUST_LOG", &self.logging.level);
        std::env::set_var("LOG_FORMAT", &self.logging.format);
        std::env::set_var("LOG_OUTPUT", &self.logging.output);
        std::env::set_var("LOG_DIR", &self.logging.directory);
    }
}

fn env_usize(var: &'static str) -> Result<Option<usize>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvVar { var, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.builder.max_depth, None);
        assert_eq!(config.registry.schema_path, None);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.logging.output, "console");
        assert_eq!(config.limits(), Limits::default());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str("builder:\n  max_joins: 2\n").unwrap();
        assert_eq!(config.builder.max_joins, Some(2));
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_env_var_override() {
        std::env::set_var("DBQ_MAX_DEPTH", "12");
        std::env::set_var("DBQ_SCHEMA_PATH", "/etc/dbq/schema.yaml");

        let config_yaml = r#"
builder:
  max_depth: 4
  max_joins: 3
registry:
  schema_path: "./schema.yaml"
logging:
  level: "info"
  format: "pretty"
  output: "console"
  directory: "./logs"
"#;
        let temp_file = std::env::temp_dir().join("dbq_test_config.yaml");
        std::fs::write(&temp_file, config_yaml).unwrap();

        let config = Config::load(&temp_file).unwrap();
        assert_eq!(config.builder.max_depth, Some(12)); // Overridden
        assert_eq!(config.builder.max_joins, Some(3));
        // Overridden
        assert_eq!(config.registry.schema_path.as_deref(), Some("/etc/dbq/schema.yaml"));

        std::env::remove_var("DBQ_MAX_DEPTH");
        std::env::remove_var("DBQ_SCHEMA_PATH");
        std::fs::remove_file(temp_file).ok();
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("dbq_missing_config.yaml");
        std::fs::remove_file(&path).ok();

        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.builder.max_joins, None);
    }
}
