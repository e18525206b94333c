//! Configuration module
//!
//! This module handles application configuration, including loading from
//! different sources (files, environment variables, command line arguments)
//! and validating the configuration.
//!
//! Configuration is resolved once at startup and is immutable afterwards.

mod builder;
mod defaults;
pub mod error;
mod merger;
mod source;
mod validator;

pub use self::builder::ConfigBuilder;
pub use self::error::ConfigError;
pub use self::merger::ConfigMerger;
pub use self::source::{ConfigSource, ConfigValues, EnvSource, FileSource};
pub use self::validator::{validate_config, ConfigValidator};
pub use defaults::{ENV_PREFIX, LISTEN_STR, LOG_LEVEL_STR, UPSTREAM_STR};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::common::{parse_host_port, HostPort, Result};

/// Upstream certificate verification mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TlsVerifyMode {
    /// Validate the upstream chain against the trust store and check the
    /// server name; reject the handshake on any mismatch
    #[default]
    Strict,
    /// Accept any upstream certificate
    Insecure,
}

impl fmt::Display for TlsVerifyMode {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Insecure => write!(f, "insecure"),
        }
    }
}

impl FromStr for TlsVerifyMode {
    type Err = ConfigError;

    #[inline]
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "insecure" => Ok(Self::Insecure),
            _ => Err(ConfigError::InvalidValue(
                "tls_verify".to_string(),
                format!("Invalid TLS verification mode: {}. Valid values are: strict, insecure", s),
            )),
        }
    }
}

/// Relay configuration
///
/// The fully resolved configuration, after every source has been applied
/// and defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    // --- Network settings ---

    /// Inbound address the listener binds (host:port)
    pub listen: String,

    /// Fixed upstream target every session dials (host:port)
    pub upstream: String,

    // --- TLS settings ---

    /// Upstream certificate verification mode
    pub tls_verify: TlsVerifyMode,

    /// Additional PEM trust anchors used in strict mode
    pub ca_file: Option<PathBuf>,

    /// Name sent as SNI and checked against the upstream certificate.
    /// Defaults to the upstream host.
    pub server_name: Option<String>,

    // --- General settings ---

    /// Chunk size used by every relay read (in bytes)
    pub buffer_size: usize,

    /// Dial plus TLS handshake timeout in seconds
    pub connect_timeout: u64,

    /// Seconds the second relay direction may sit idle after the first
    /// reached end-of-stream before it is stopped
    pub drain_timeout: u64,

    /// Seconds to wait for in-flight sessions on shutdown
    pub shutdown_timeout: u64,

    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for RelayConfig {
    #[inline]
    fn default() -> Self {
        Self {
            listen: defaults::listen(),
            upstream: defaults::upstream(),
            tls_verify: defaults::tls_verify(),
            ca_file: None,
            server_name: None,
            buffer_size: defaults::buffer_size(),
            connect_timeout: defaults::connect_timeout(),
            drain_timeout: defaults::drain_timeout(),
            shutdown_timeout: defaults::shutdown_timeout(),
            log_level: defaults::log_level(),
        }
    }
}

impl RelayConfig {
    /// Parse the listen address
    pub fn listen_addr(&self) -> Result<HostPort> {
        parse_host_port(&self.listen)
    }

    /// Parse the upstream address
    pub fn upstream_addr(&self) -> Result<HostPort> {
        parse_host_port(&self.upstream)
    }
}

/// Log the configuration
pub fn log_config(config: &RelayConfig) {
    use log::info;

    if !log::log_enabled!(log::Level::Info) {
        return;
    }

    info!("=== Final Configuration ===");
    info!("  Listen address: {}", config.listen);
    info!("  Upstream address: {}", config.upstream);
    info!("  TLS verification: {}", config.tls_verify);
    if let Some(ref ca_file) = config.ca_file {
        info!("  Extra CA file: {}", ca_file.display());
    }
    if let Some(ref name) = config.server_name {
        info!("  TLS server name: {}", name);
    }
    info!("  Buffer size: {} bytes", config.buffer_size);
    info!("  Connect timeout: {} seconds", config.connect_timeout);
    info!("  Drain timeout: {} seconds", config.drain_timeout);
    info!("  Shutdown timeout: {} seconds", config.shutdown_timeout);
    info!("  Log level: {}", config.log_level);
    info!("===========================");
}
