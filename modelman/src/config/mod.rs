use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How many failures per path a validation run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Stop at the first failing check of each path.
    #[default]
    FirstFailure,
    /// Run every check and report all failures of each path.
    AllFailures,
}

/// Registry-wide configuration, fixed when a [`ModelRegistry`](crate::ModelRegistry)
/// is constructed and threaded into every property builder it hands out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reject values whose shape a validator does not understand instead of
    /// letting them pass.
    pub strict: bool,
    pub aggregation: Aggregation,
    /// Fail `finalize()` when two different type selectors were called on
    /// one builder. When false, the last selector wins.
    pub reject_conflicting_types: bool,
    /// Store connection URL used by [`connect_default`](crate::store::connect_default).
    pub connection: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            strict: false,
            aggregation: Aggregation::FirstFailure,
            reject_conflicting_types: true,
            connection: "memory:".to_string(),
        }
    }
}

/// A partial configuration; unset keys keep their current values when merged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigOverrides {
    pub strict: Option<bool>,
    pub aggregation: Option<Aggregation>,
    pub reject_conflicting_types: Option<bool>,
    pub connection: Option<String>,
}

impl Config {
    /// Parse a YAML configuration. Missing keys take their defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Read a YAML configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Merge `overrides` over this configuration.
    pub fn configure(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(strict) = overrides.strict {
            self.strict = strict;
        }
        if let Some(aggregation) = overrides.aggregation {
            self.aggregation = aggregation;
        }
        if let Some(reject) = overrides.reject_conflicting_types {
            self.reject_conflicting_types = reject;
        }
        if let Some(connection) = overrides.connection {
            self.connection = connection;
        }
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn reject_conflicting_types(mut self, reject: bool) -> Self {
        self.reject_conflicting_types = reject;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.strict);
        assert_eq!(config.aggregation, Aggregation::FirstFailure);
        assert!(config.reject_conflicting_types);
        assert_eq!(config.connection, "memory:");
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = Config::from_yaml_str("strict: true\naggregation: all_failures\n").unwrap();
        assert!(config.strict);
        assert_eq!(config.aggregation, Aggregation::AllFailures);
        // Unspecified keys keep defaults
        assert!(config.reject_conflicting_types);
    }

    #[test]
    fn test_from_empty_yaml() {
        assert_eq!(Config::from_yaml_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_configure_merges() {
        let overrides: ConfigOverrides =
            serde_yaml::from_str("connection: 'sqlite::memory:'").unwrap();
        let config = Config::default().strict(true).configure(overrides);
        assert!(config.strict);
        assert_eq!(config.connection, "sqlite::memory:");
    }

    #[test]
    fn test_from_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("modelman.yaml");
        std::fs::write(&path, "reject_conflicting_types: false\n").unwrap();

        let config = Config::from_path(&path).unwrap();
        assert!(!config.reject_conflicting_types);
    }
}
