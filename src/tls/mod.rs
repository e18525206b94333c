//! TLS handling module
//!
//! The relay is a TLS client only: inbound connections are plaintext and the
//! upstream leg is encrypted.

mod connector;
mod upstream;

pub use connector::create_tls_connector;
pub use upstream::UpstreamTarget;
