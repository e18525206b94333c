//! Configuration validator
//!
//! This module provides functionality for validating configuration.

use log::warn;

use super::error::{ConfigError, Result};
use super::{RelayConfig, TlsVerifyMode};
use crate::common::parse_host_port;

/// Validate the configuration
///
/// Hard errors are returned; soft problems are logged as warnings.
pub fn validate_config(config: &RelayConfig) -> Result<()> {
    validate_network_settings(config)?;
    validate_tls_settings(config)?;
    validate_general_settings(config)?;

    for warning in config.check_warnings() {
        warn!("{}", warning);
    }

    Ok(())
}

fn validate_network_settings(config: &RelayConfig) -> Result<()> {
    parse_host_port(&config.listen)
        .map_err(|e| ConfigError::InvalidValue("listen".to_string(), e.to_string()))?;

    let upstream = parse_host_port(&config.upstream)
        .map_err(|e| ConfigError::InvalidValue("upstream".to_string(), e.to_string()))?;

    if upstream.port == 0 {
        return Err(ConfigError::InvalidValue(
            "upstream".to_string(),
            "Upstream port must not be 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_tls_settings(config: &RelayConfig) -> Result<()> {
    if let Some(ref ca_file) = config.ca_file {
        if !ca_file.is_file() {
            return Err(ConfigError::FileNotFound(ca_file.clone()));
        }
    }

    if let Some(ref name) = config.server_name {
        if name.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "server_name".to_string(),
                "TLS server name must not be empty".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_general_settings(config: &RelayConfig) -> Result<()> {
    if config.buffer_size == 0 {
        return Err(ConfigError::InvalidValue(
            "buffer_size".to_string(),
            "Buffer size must be greater than 0".to_string(),
        ));
    }

    if config.connect_timeout == 0 {
        return Err(ConfigError::InvalidValue(
            "connect_timeout".to_string(),
            "Connect timeout must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// Configuration validator trait
pub trait ConfigValidator {
    /// Check configuration for warnings
    fn check_warnings(&self) -> Vec<String>;
}

impl ConfigValidator for RelayConfig {
    fn check_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        match self.log_level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            level => warnings.push(format!("Unknown log level '{}'", level)),
        }

        if self.tls_verify == TlsVerifyMode::Insecure {
            warnings.push(
                "Upstream certificate verification is disabled (tls_verify = insecure)".to_string(),
            );
            if self.ca_file.is_some() {
                warnings.push("ca_file is ignored when tls_verify = insecure".to_string());
            }
        }

        warnings
    }
}
