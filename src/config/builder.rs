//! Configuration builder
//!
//! This module provides a builder pattern for constructing configuration.

use log::debug;
use std::path::Path;

use super::error::Result;
use super::merger::ConfigMerger;
use super::source::{ConfigSource, ConfigValues, EnvSource, FileSource};
use super::validator::validate_config;
use super::RelayConfig;

/// Configuration builder
///
/// Sources are applied in the order they were added, lowest priority first.
pub struct ConfigBuilder {
    sources: Vec<Box<dyn ConfigSource>>,
    validate: bool,
}

impl ConfigBuilder {
    /// Create a new configuration builder with no sources
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            validate: true,
        }
    }

    /// Add file source
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        debug!("Adding file configuration source: {}", path.display());
        self.sources.push(Box::new(FileSource::new(path)));
        self
    }

    /// Add environment source
    pub fn with_env(mut self, prefix: &str) -> Self {
        debug!("Adding environment configuration source with prefix: {}", prefix);
        self.sources.push(Box::new(EnvSource::new(prefix)));
        self
    }

    /// Add explicit values, typically parsed from the command line
    pub fn with_values(mut self, values: ConfigValues) -> Self {
        self.sources.push(Box::new(values));
        self
    }

    /// Disable validation
    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<RelayConfig> {
        debug!("Building configuration from {} sources", self.sources.len());

        let mut values = ConfigValues::default();
        for source in &self.sources {
            debug!("Loading configuration from source: {}", source.source_type());
            values = values.merge(source.load()?);
        }

        let config = values.resolve();

        if self.validate {
            validate_config(&config)?;
        }

        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
