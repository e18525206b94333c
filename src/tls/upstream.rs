//! The fixed upstream target and its TLS dial

use log::debug;
use openssl::ssl::{SslConnector, SslVerifyMode};
use openssl::x509::X509VerifyResult;
use std::fmt;
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio_openssl::SslStream;

use super::connector::create_tls_connector;
use crate::common::{HostPort, ProxyError, Result};
use crate::config::{RelayConfig, TlsVerifyMode};

/// Upstream target shared read-only by every session
pub struct UpstreamTarget {
    /// Address dialed for every session
    addr: HostPort,
    /// Name used for SNI and certificate hostname checks
    server_name: String,
    /// Certificate verification mode
    verify: TlsVerifyMode,
    /// Prepared TLS client context
    connector: SslConnector,
}

impl fmt::Debug for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamTarget")
            .field("addr", &self.addr)
            .field("server_name", &self.server_name)
            .field("verify", &self.verify)
            .field("connector", &"<SslConnector>")
            .finish()
    }
}

impl UpstreamTarget {
    /// Create an upstream target with an explicit connector
    pub fn new(
        addr: HostPort,
        server_name: Option<String>,
        verify: TlsVerifyMode,
        connector: SslConnector,
    ) -> Self {
        let server_name = server_name.unwrap_or_else(|| addr.host.clone());
        Self { addr, server_name, verify, connector }
    }

    /// Build the upstream target described by the configuration
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let addr = config.upstream_addr()?;
        let connector = create_tls_connector(config.tls_verify, config.ca_file.as_deref())?;
        Ok(Self::new(addr, config.server_name.clone(), config.tls_verify, connector))
    }

    /// Upstream address
    pub fn addr(&self) -> &HostPort {
        &self.addr
    }

    /// TLS server name
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Certificate verification mode
    pub fn verify_mode(&self) -> TlsVerifyMode {
        self.verify
    }

    /// Dial the upstream and complete a TLS client handshake
    ///
    /// # Errors
    ///
    /// `ProxyError::Connect` when the TCP dial fails and
    /// `ProxyError::TlsHandshake` when the handshake is rejected, including
    /// the certificate verification result when that was the cause.
    pub async fn connect(&self) -> Result<SslStream<TcpStream>> {
        let tcp = TcpStream::connect((self.addr.host.as_str(), self.addr.port))
            .await
            .map_err(|source| ProxyError::Connect {
                addr: self.addr.to_string(),
                source,
            })?;
        tcp.set_nodelay(true)?;
        debug!("Connected to upstream {} ({:?})", self.addr, tcp.peer_addr().ok());

        let mut config = self.connector.configure()?;
        if self.verify == TlsVerifyMode::Insecure {
            config.set_verify(SslVerifyMode::NONE);
            config = config.verify_hostname(false);
        }
        let ssl = config.into_ssl(&self.server_name)?;

        let mut stream = SslStream::new(ssl, tcp)?;
        if let Err(e) = Pin::new(&mut stream).connect().await {
            let verify_result = stream.ssl().verify_result();
            return Err(if verify_result != X509VerifyResult::OK {
                ProxyError::TlsHandshake(format!(
                    "certificate verification failed for {}: {}",
                    self.server_name,
                    verify_result.error_string()
                ))
            } else {
                ProxyError::TlsHandshake(e.to_string())
            });
        }

        debug!(
            "TLS handshake with {} complete ({})",
            self.addr,
            stream.ssl().version_str()
        );
        Ok(stream)
    }
}
