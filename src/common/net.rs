//! Network utility functions
//!
//! Addresses are kept as host and port pairs rather than resolved
//! `SocketAddr`s: the upstream host doubles as the TLS server name and is
//! resolved again on every dial.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use super::error::{ProxyError, Result};

/// A `host:port` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPort {
    /// Hostname or IP literal, without brackets
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl HostPort {
    /// Create a new host and port pair
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    /// Whether the host is an IP literal rather than a DNS name
    pub fn is_ip(&self) -> bool {
        self.host.parse::<IpAddr>().is_ok()
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for HostPort {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self> {
        parse_host_port(s)
    }
}

/// Parse a `host:port` string
///
/// Accepts `1.2.3.4:80`, `[::1]:80` and `example.com:443`. No DNS lookup is
/// performed.
pub fn parse_host_port(addr: &str) -> Result<HostPort> {
    let addr = addr.trim();

    if let Ok(socket_addr) = SocketAddr::from_str(addr) {
        return Ok(HostPort::new(socket_addr.ip().to_string(), socket_addr.port()));
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| ProxyError::Config(format!("Address '{}' is missing a port", addr)))?;

    if host.is_empty() || host.contains(':') || host.contains('[') {
        return Err(ProxyError::Config(format!("Invalid host in address '{}'", addr)));
    }

    let port = port
        .parse::<u16>()
        .map_err(|e| ProxyError::Config(format!("Invalid port in address '{}': {}", addr, e)))?;

    Ok(HostPort::new(host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4() {
        let addr = parse_host_port("127.0.0.1:8080").unwrap();
        assert_eq!(addr.host, "127.0.0.1");
        assert_eq!(addr.port, 8080);
        assert!(addr.is_ip());
    }

    #[test]
    fn test_parse_ipv6() {
        let addr = parse_host_port("[::1]:443").unwrap();
        assert_eq!(addr.host, "::1");
        assert_eq!(addr.to_string(), "[::1]:443");
    }

    #[test]
    fn test_parse_hostname() {
        let addr: HostPort = "www.google.com:443".parse().unwrap();
        assert_eq!(addr.host, "www.google.com");
        assert_eq!(addr.port, 443);
        assert!(!addr.is_ip());
        assert_eq!(addr.to_string(), "www.google.com:443");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_host_port("invalid-address").is_err());
        assert!(parse_host_port(":443").is_err());
        assert!(parse_host_port("host:notaport").is_err());
        assert!(parse_host_port("host:70000").is_err());
    }
}
