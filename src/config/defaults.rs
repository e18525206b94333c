//! Default configuration values
//!
//! This module is the single source of truth for defaults.

use super::TlsVerifyMode;

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "TLS_RELAY_";

/// Default listen address as string
pub const LISTEN_STR: &str = "127.0.0.1:8000";

/// Default upstream address as string
pub const UPSTREAM_STR: &str = "www.google.com:443";

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Default listen address
pub fn listen() -> String {
    LISTEN_STR.to_string()
}

/// Default upstream address
pub fn upstream() -> String {
    UPSTREAM_STR.to_string()
}

/// Default log level
pub fn log_level() -> String {
    LOG_LEVEL_STR.to_string()
}

/// Default buffer size (64KB, four maximum-size TLS records)
pub fn buffer_size() -> usize {
    65536
}

/// Default upstream verification mode
pub fn tls_verify() -> TlsVerifyMode {
    TlsVerifyMode::Strict
}

/// Default dial and handshake timeout in seconds
pub fn connect_timeout() -> u64 {
    30
}

/// Default idle bound in seconds for the second relay direction after the
/// first one reached end-of-stream
pub fn drain_timeout() -> u64 {
    10
}

/// Default time in seconds to wait for sessions on shutdown
pub fn shutdown_timeout() -> u64 {
    30
}
