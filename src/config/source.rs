//! Configuration sources
//!
//! Every source produces a partial [`ConfigValues`]; unset options stay `None`
//! so that lower-priority sources show through when merged.

use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use super::defaults;
use super::error::{ConfigError, Result};
use super::{RelayConfig, TlsVerifyMode};

/// Source of a configuration layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueSource {
    /// From configuration file
    File,
    /// From environment variable
    Environment,
    /// From command line argument
    CommandLine,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::File => write!(f, "file"),
            ValueSource::Environment => write!(f, "environment"),
            ValueSource::CommandLine => write!(f, "command line"),
        }
    }
}

/// Partial configuration values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigValues {
    /// Inbound address (host:port)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
    /// Upstream target (host:port)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
    /// Upstream certificate verification mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_verify: Option<TlsVerifyMode>,
    /// Additional PEM trust anchors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,
    /// TLS server name override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    /// Relay chunk size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<usize>,
    /// Dial plus handshake timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<u64>,
    /// Idle bound in seconds on the remaining direction after a half-close
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drain_timeout: Option<u64>,
    /// Seconds to wait for sessions on shutdown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown_timeout: Option<u64>,
    /// Log level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl ConfigValues {
    /// Fill unset options with defaults
    pub fn resolve(self) -> RelayConfig {
        RelayConfig {
            listen: self.listen.unwrap_or_else(defaults::listen),
            upstream: self.upstream.unwrap_or_else(defaults::upstream),
            tls_verify: self.tls_verify.unwrap_or_else(defaults::tls_verify),
            ca_file: self.ca_file,
            server_name: self.server_name,
            buffer_size: self.buffer_size.unwrap_or_else(defaults::buffer_size),
            connect_timeout: self.connect_timeout.unwrap_or_else(defaults::connect_timeout),
            drain_timeout: self.drain_timeout.unwrap_or_else(defaults::drain_timeout),
            shutdown_timeout: self.shutdown_timeout.unwrap_or_else(defaults::shutdown_timeout),
            log_level: self.log_level.unwrap_or_else(defaults::log_level),
        }
    }

    /// Build values from `(name, value)` pairs, keeping only names that start
    /// with `prefix`
    pub fn from_env_vars<I>(prefix: &str, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut values = Self::default();

        for (name, value) in vars {
            let Some(key) = name.strip_prefix(prefix) else {
                continue;
            };
            debug!("Found environment variable {}={}", name, value);

            match key {
                "LISTEN" => values.listen = Some(value),
                "UPSTREAM" => values.upstream = Some(value),
                "TLS_VERIFY" => values.tls_verify = Some(value.parse()?),
                "CA_FILE" => values.ca_file = Some(PathBuf::from(value)),
                "SERVER_NAME" => values.server_name = Some(value),
                "BUFFER_SIZE" => values.buffer_size = Some(parse_number(&name, &value)?),
                "CONNECT_TIMEOUT" => values.connect_timeout = Some(parse_number(&name, &value)?),
                "DRAIN_TIMEOUT" => values.drain_timeout = Some(parse_number(&name, &value)?),
                "SHUTDOWN_TIMEOUT" => values.shutdown_timeout = Some(parse_number(&name, &value)?),
                "LOG_LEVEL" => values.log_level = Some(value),
                // Consumed by the command line front end
                "CONFIG_FILE" => {}
                _ => debug!("Ignoring unknown environment variable {}", name),
            }
        }

        Ok(values)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("'{}': {}", value, e)))
}

/// Configuration source trait
pub trait ConfigSource {
    /// Load configuration from this source
    fn load(&self) -> Result<ConfigValues>;

    /// Get the source type
    fn source_type(&self) -> ValueSource;
}

/// JSON file configuration source
pub struct FileSource {
    pub path: PathBuf,
}

impl FileSource {
    /// Create a new file source
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<ConfigValues> {
        debug!("Loading configuration from file: {}", self.path.display());

        if !self.path.is_file() {
            return Err(ConfigError::FileNotFound(self.path.clone()));
        }

        let contents = fs::read_to_string(&self.path)
            .map_err(|e| ConfigError::FileReadError(self.path.clone(), e.to_string()))?;

        serde_json::from_str::<ConfigValues>(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", self.path.display(), e)))
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::File
    }
}

/// Environment variable configuration source
pub struct EnvSource {
    pub prefix: String,
}

impl EnvSource {
    /// Create a new environment source
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }
}

impl ConfigSource for EnvSource {
    fn load(&self) -> Result<ConfigValues> {
        debug!("Loading configuration from environment variables with prefix: {}", self.prefix);
        ConfigValues::from_env_vars(&self.prefix, std::env::vars())
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::Environment
    }
}

/// Explicit values act as the command line layer
impl ConfigSource for ConfigValues {
    fn load(&self) -> Result<ConfigValues> {
        Ok(self.clone())
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::CommandLine
    }
}
