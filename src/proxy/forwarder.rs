//! Data forwarding module
//!
//! A relay copies one direction of a session: it reads from a source, writes
//! every chunk to a sink, and half-closes the sink when the source reaches
//! end-of-stream. It never closes the handle it reads from.

use log::debug;
use metrics::counter;
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{oneshot, watch};

/// Direction of a relay within its session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Inbound client to upstream target
    ClientToUpstream,
    /// Upstream target to inbound client
    UpstreamToClient,
}

impl Direction {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientToUpstream => "client->upstream",
            Self::UpstreamToClient => "upstream->client",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The source reached end-of-stream and the sink was half-closed
    Completed,
    /// A read or write failed; never retried
    Failed(String),
    /// The owning session stopped the relay while it was still running
    Cancelled,
}

impl RelayOutcome {
    /// Whether the relay ended on a clean end-of-stream
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for RelayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What a finished relay reports back to its session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    /// Direction that was relayed
    pub direction: Direction,
    /// Bytes written to the sink
    pub bytes: u64,
    /// How the relay ended
    pub outcome: RelayOutcome,
}

/// Signal used by a session to stop a running relay
pub type StopSignal = oneshot::Receiver<()>;

/// One direction of a session
pub struct RelayTask<R, W> {
    direction: Direction,
    source: R,
    sink: W,
    buffer_size: usize,
    progress: watch::Sender<u64>,
}

impl<R, W> RelayTask<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a relay from `source` to `sink`
    pub fn new(direction: Direction, source: R, sink: W, buffer_size: usize) -> Self {
        Self {
            direction,
            source,
            sink,
            buffer_size: buffer_size.max(1),
            progress: watch::Sender::new(0),
        }
    }

    /// Watch the running byte total
    ///
    /// The value is updated after every chunk written to the sink. The
    /// receiver reports a closed channel once the relay has ended.
    pub fn progress(&self) -> watch::Receiver<u64> {
        self.progress.subscribe()
    }

    /// Run until end-of-stream, an I/O error, or `stop` fires
    ///
    /// A dropped stop sender counts as a stop request.
    pub async fn run(mut self, mut stop: StopSignal) -> RelayReport {
        let mut buffer = vec![0u8; self.buffer_size];
        let mut total_bytes: u64 = 0;

        let outcome = loop {
            let step = tokio::select! {
                _ = &mut stop => break RelayOutcome::Cancelled,
                step = copy_chunk(&mut self.source, &mut self.sink, &mut buffer) => step,
            };

            match step {
                Ok(0) => {
                    debug!("{}: end of stream after {} bytes", self.direction, total_bytes);
                    tokio::select! {
                        _ = &mut stop => {}
                        result = self.sink.shutdown() => {
                            if let Err(e) = result {
                                debug!("{}: half-close of sink failed: {}", self.direction, e);
                            }
                        }
                    }
                    break RelayOutcome::Completed;
                }
                Ok(n) => {
                    total_bytes += n as u64;
                    self.progress.send_replace(total_bytes);
                    counter!("tls_relay_bytes_total", "direction" => self.direction.as_str())
                        .increment(n as u64);
                }
                Err(e) => break RelayOutcome::Failed(e.to_string()),
            }
        };

        RelayReport {
            direction: self.direction,
            bytes: total_bytes,
            outcome,
        }
    }
}

/// Read one chunk and write all of it; `Ok(0)` means end-of-stream
async fn copy_chunk<R, W>(source: &mut R, sink: &mut W, buffer: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let n = source.read(buffer).await?;
    if n > 0 {
        sink.write_all(&buffer[..n]).await?;
        sink.flush().await?;
    }
    Ok(n)
}
