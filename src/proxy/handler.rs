//! Connection handler module
//!
//! A [`ConnectionSession`] owns one accepted client connection and its paired
//! upstream TLS connection. It walks through
//! `Handshaking → Relaying → Draining → Closed`, and every path ends in
//! `Closed` with both connections released exactly once.

use log::{debug, error, info, warn};
use metrics::counter;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_openssl::SslStream;

use super::forwarder::{Direction, RelayOutcome, RelayReport, RelayTask, StopSignal};
use crate::common::{ProxyError, Result};
use crate::config::RelayConfig;
use crate::tls::UpstreamTarget;

/// Per-session tunables, shared by every session of a listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Chunk size for both relay directions
    pub buffer_size: usize,
    /// Bound on dial plus TLS handshake
    pub connect_timeout: Duration,
    /// How long the second relay may run after the first completed cleanly
    pub drain_timeout: Duration,
}

impl SessionSettings {
    /// Derive session settings from the configuration
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            buffer_size: config.buffer_size,
            connect_timeout: Duration::from_secs(config.connect_timeout),
            drain_timeout: Duration::from_secs(config.drain_timeout),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Dialing upstream and negotiating TLS
    Handshaking,
    /// Both relays running
    Relaying,
    /// One relay finished, waiting for the other
    Draining,
    /// All resources released
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handshaking => write!(f, "Handshaking"),
            Self::Relaying => write!(f, "Relaying"),
            Self::Draining => write!(f, "Draining"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The upstream could not be reached or rejected the handshake; no relay
    /// was started
    HandshakeFailed(String),
    /// Both relays ran and finished
    Relayed {
        /// Client to upstream report
        client_to_upstream: RelayReport,
        /// Upstream to client report
        upstream_to_client: RelayReport,
    },
}

/// Final report of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Session id, unique per listener
    pub id: u64,
    /// Client address
    pub peer: SocketAddr,
    /// Last state reached; always `Closed` once `run` returns
    pub state: SessionState,
    /// How the session ended
    pub outcome: SessionOutcome,
}

/// One accepted connection and its upstream counterpart
pub struct ConnectionSession {
    id: u64,
    peer: SocketAddr,
    client: TcpStream,
    upstream: Arc<UpstreamTarget>,
    settings: Arc<SessionSettings>,
    state: SessionState,
}

impl ConnectionSession {
    /// Create a session for an accepted client connection
    pub fn new(
        id: u64,
        peer: SocketAddr,
        client: TcpStream,
        upstream: Arc<UpstreamTarget>,
        settings: Arc<SessionSettings>,
    ) -> Self {
        Self {
            id,
            peer,
            client,
            upstream,
            settings,
            state: SessionState::Handshaking,
        }
    }

    /// Drive the session to completion
    ///
    /// Never fails: every error is contained here, logged, and recorded in
    /// the returned report.
    pub async fn run(mut self) -> SessionReport {
        debug!("[session {}] {} -> {}: {}", self.id, self.peer, self.upstream.addr(), self.state);

        let upstream = match self.handshake().await {
            Ok(stream) => stream,
            Err(e) => {
                error!(
                    "[session {}] Upstream handshake with {} (server name {}) failed for {}: {}",
                    self.id,
                    self.upstream.addr(),
                    self.upstream.server_name(),
                    self.peer,
                    e
                );
                counter!("tls_relay_handshake_failures_total").increment(1);
                let (id, peer) = (self.id, self.peer);
                // Dropping the session closes the client connection
                drop(self);
                debug!("[session {}] {}", id, SessionState::Closed);
                return SessionReport {
                    id,
                    peer,
                    state: SessionState::Closed,
                    outcome: SessionOutcome::HandshakeFailed(e.to_string()),
                };
            }
        };

        self.transition(SessionState::Relaying);

        let ConnectionSession { id, peer, client, settings, .. } = self;
        let buffer_size = settings.buffer_size;

        let (client_read, client_write) = client.into_split();
        let (upstream_read, upstream_write) = tokio::io::split(upstream);

        let (stop_c2u, stop_c2u_rx) = oneshot::channel();
        let (stop_u2c, stop_u2c_rx) = oneshot::channel();

        let mut c2u = RelayHandle::spawn(
            RelayTask::new(Direction::ClientToUpstream, client_read, upstream_write, buffer_size),
            Direction::ClientToUpstream,
            stop_c2u_rx,
        );
        let mut u2c = RelayHandle::spawn(
            RelayTask::new(Direction::UpstreamToClient, upstream_read, client_write, buffer_size),
            Direction::UpstreamToClient,
            stop_u2c_rx,
        );

        // Wait for whichever direction finishes first
        let (first, second, stop_second) = tokio::select! {
            report = c2u.join() => (report, u2c, stop_u2c),
            report = u2c.join() => (report, c2u, stop_c2u),
        };
        log_relay(id, &first);

        debug!("[session {}] {}", id, SessionState::Draining);
        let second = drain(id, &first, second, stop_second, settings.drain_timeout).await;
        log_relay(id, &second);

        // Both relay tasks have ended, so every half of both connections has
        // been dropped and the sockets are closed.
        let (client_to_upstream, upstream_to_client) = match first.direction {
            Direction::ClientToUpstream => (first, second),
            Direction::UpstreamToClient => (second, first),
        };

        info!(
            "[session {}] Closed {}: {} bytes client->upstream, {} bytes upstream->client",
            id, peer, client_to_upstream.bytes, upstream_to_client.bytes
        );

        SessionReport {
            id,
            peer,
            state: SessionState::Closed,
            outcome: SessionOutcome::Relayed {
                client_to_upstream,
                upstream_to_client,
            },
        }
    }

    async fn handshake(&self) -> Result<SslStream<TcpStream>> {
        timeout(self.settings.connect_timeout, self.upstream.connect())
            .await
            .map_err(|_| {
                ProxyError::Timeout(format!(
                    "upstream {} did not complete the handshake within {:?}",
                    self.upstream.addr(),
                    self.settings.connect_timeout
                ))
            })?
    }

    fn transition(&mut self, state: SessionState) {
        debug!("[session {}] {} -> {}", self.id, self.state, state);
        self.state = state;
    }
}

/// A spawned relay task that is aborted if the session is dropped first
///
/// Sessions can be aborted by the listener on shutdown; the relay tasks must
/// not outlive them.
struct RelayHandle {
    direction: Direction,
    handle: JoinHandle<RelayReport>,
    progress: watch::Receiver<u64>,
}

impl RelayHandle {
    fn spawn<R, W>(task: RelayTask<R, W>, direction: Direction, stop: StopSignal) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let progress = task.progress();
        Self {
            direction,
            handle: tokio::spawn(task.run(stop)),
            progress,
        }
    }

    /// Wait for the relay; must not be called again once it has returned
    async fn join(&mut self) -> RelayReport {
        joined(self.direction, &mut self.handle).await
    }
}

async fn joined(direction: Direction, handle: &mut JoinHandle<RelayReport>) -> RelayReport {
    handle.await.unwrap_or_else(|e| RelayReport {
        direction,
        bytes: 0,
        outcome: RelayOutcome::Failed(format!("relay task ended abnormally: {}", e)),
    })
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Wait for the remaining relay, stopping it when the session tears down
///
/// After a clean end-of-stream the remaining direction keeps running for as
/// long as it moves data; it is stopped once it has been idle for
/// `drain_timeout`. After a failure it is stopped at once.
async fn drain(
    id: u64,
    first: &RelayReport,
    mut second: RelayHandle,
    stop_second: oneshot::Sender<()>,
    drain_timeout: Duration,
) -> RelayReport {
    if first.outcome.is_completed() && !drain_timeout.is_zero() {
        loop {
            tokio::select! {
                report = joined(second.direction, &mut second.handle) => return report,
                changed = second.progress.changed() => {
                    if changed.is_err() {
                        // Relay has ended; its report is ready
                        return second.join().await;
                    }
                }
                _ = sleep(drain_timeout) => break,
            }
        }
        info!(
            "[session {}] {} idle for {:?} after {} ended, stopping it",
            id, second.direction, drain_timeout, first.direction
        );
    }

    // The relay may already have finished, in which case nobody is listening
    let _ = stop_second.send(());
    second.join().await
}

fn log_relay(id: u64, report: &RelayReport) {
    match &report.outcome {
        RelayOutcome::Completed => info!(
            "[session {}] {} completed, {} bytes",
            id, report.direction, report.bytes
        ),
        RelayOutcome::Failed(reason) => error!(
            "[session {}] {} failed after {} bytes: {}",
            id, report.direction, report.bytes, reason
        ),
        RelayOutcome::Cancelled if report.bytes > 0 => warn!(
            "[session {}] {} stopped after {} bytes without reaching end of stream",
            id, report.direction, report.bytes
        ),
        RelayOutcome::Cancelled => debug!(
            "[session {}] {} stopped with no bytes relayed",
            id, report.direction
        ),
    }
}
