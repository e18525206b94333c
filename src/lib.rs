//! TLS Relay: transparent TCP forwarding with an outbound TLS leg
//!
//! The relay accepts plaintext TCP connections, opens a TLS connection to a
//! single fixed upstream for each of them, and copies bytes in both
//! directions until either side is done. Payloads are never inspected.
//!
//! # Main Features
//!
//! - One independent session per accepted connection, no connection cap
//! - Strict upstream certificate verification against the system trust store
//! - Half-close propagation in both directions
//! - Bounded teardown: a session never waits forever on a stalled direction
//!
//! # Example
//!
//! ```no_run
//! use tls_relay::{Proxy, Result};
//! use tls_relay::config::RelayConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = RelayConfig {
//!         listen: "127.0.0.1:8000".to_string(),
//!         upstream: "www.google.com:443".to_string(),
//!         ..RelayConfig::default()
//!     };
//!
//!     let proxy = Proxy::bind(&config).await?;
//!     proxy.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await
//! }
//! ```

// Public modules
pub mod common;
pub mod config;
pub mod proxy;
pub mod tls;

// Re-export commonly used structures and functions for convenience
pub use common::{ProxyError, Result};
pub use config::RelayConfig;
pub use proxy::Proxy;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
