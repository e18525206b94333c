//! Proxy server module
//!
//! The listener accepts plaintext clients and spawns one
//! [`ConnectionSession`] per connection. Sessions run fully independently;
//! there is no connection limit.

use log::{debug, error, info, warn};
use metrics::{counter, gauge};
use std::future::{self, Future};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use super::handler::{ConnectionSession, SessionReport, SessionSettings};
use crate::common::{HostPort, ProxyError, Result};
use crate::config::RelayConfig;
use crate::tls::UpstreamTarget;

/// Pause after a failed accept so a persistent error does not spin the loop
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Inbound address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Inbound host
    pub host: String,
    /// Inbound port
    pub port: u16,
}

impl ListenerConfig {
    /// Listener settings from the configuration
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let HostPort { host, port } = config.listen_addr()?;
        Ok(Self { host, port })
    }
}

/// Proxy server structure
///
/// Accepts client connections and relays each one to the upstream target
/// over TLS.
pub struct Proxy {
    /// Bound listening socket
    listener: TcpListener,
    /// Upstream target shared by every session
    upstream: Arc<UpstreamTarget>,
    /// Session tunables shared by every session
    settings: Arc<SessionSettings>,
    /// How long to wait for sessions on shutdown
    shutdown_timeout: Duration,
}

impl Proxy {
    /// Bind the listener described by the configuration
    ///
    /// # Errors
    ///
    /// `ProxyError::Bind` when the address cannot be bound, and configuration
    /// or TLS errors when the upstream target cannot be prepared.
    pub async fn bind(config: &RelayConfig) -> Result<Self> {
        let listen = ListenerConfig::from_config(config)?;
        let upstream = UpstreamTarget::from_config(config)?;
        let settings = SessionSettings::from_config(config);

        Self::bind_with(
            &listen,
            upstream,
            settings,
            Duration::from_secs(config.shutdown_timeout),
        )
        .await
    }

    /// Bind with explicitly constructed parts
    pub async fn bind_with(
        listen: &ListenerConfig,
        upstream: UpstreamTarget,
        settings: SessionSettings,
        shutdown_timeout: Duration,
    ) -> Result<Self> {
        let listener = TcpListener::bind((listen.host.as_str(), listen.port))
            .await
            .map_err(|source| ProxyError::Bind {
                addr: HostPort::new(listen.host.clone(), listen.port).to_string(),
                source,
            })?;

        Ok(Self {
            listener,
            upstream: Arc::new(upstream),
            settings: Arc::new(settings),
            shutdown_timeout,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run until a fatal error occurs
    pub async fn run(self) -> Result<()> {
        self.run_until(future::pending::<()>()).await
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// On shutdown the listening socket is closed at once, in-flight sessions
    /// get the configured shutdown timeout to finish, and the rest are
    /// aborted.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Proxy {
            listener,
            upstream,
            settings,
            shutdown_timeout,
        } = self;

        info!(
            "Relay listening on {}, forwarding to {} over TLS (server name {}, verification {})",
            listener.local_addr()?,
            upstream.addr(),
            upstream.server_name(),
            upstream.verify_mode()
        );

        let mut tasks: JoinSet<SessionReport> = JoinSet::new();
        let mut next_id: u64 = 0;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((client_stream, client_addr)) => {
                            next_id += 1;
                            info!("[session {}] Accepted connection from {}", next_id, client_addr);

                            if let Err(e) = client_stream.set_nodelay(true) {
                                debug!("[session {}] Failed to set TCP_NODELAY: {}", next_id, e);
                            }

                            counter!("tls_relay_sessions_total").increment(1);
                            gauge!("tls_relay_sessions_active").increment(1.0);

                            let session = ConnectionSession::new(
                                next_id,
                                client_addr,
                                client_stream,
                                Arc::clone(&upstream),
                                Arc::clone(&settings),
                            );
                            tasks.spawn(session.run());
                        }
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }

                Some(result) = tasks.join_next() => {
                    reap(result);
                }
            }
        }

        drop(listener);
        drain_sessions(&mut tasks, shutdown_timeout).await;

        info!("Relay shutdown complete");
        Ok(())
    }
}

fn reap(result: std::result::Result<SessionReport, tokio::task::JoinError>) {
    gauge!("tls_relay_sessions_active").decrement(1.0);
    match result {
        Ok(report) => debug!("[session {}] Reaped ({})", report.id, report.state),
        Err(e) if e.is_cancelled() => debug!("Session task aborted"),
        Err(e) => error!("Session task error: {}", e),
    }
}

async fn drain_sessions(tasks: &mut JoinSet<SessionReport>, shutdown_timeout: Duration) {
    if tasks.is_empty() {
        return;
    }

    info!("Waiting up to {:?} for {} active sessions", shutdown_timeout, tasks.len());
    let waited = tokio::time::timeout(shutdown_timeout, async {
        while let Some(result) = tasks.join_next().await {
            reap(result);
        }
    })
    .await;

    if waited.is_err() {
        warn!("Shutdown timeout reached, aborting {} sessions", tasks.len());
        tasks.abort_all();
        while let Some(result) = tasks.join_next().await {
            reap(result);
        }
    }
}
