//! Proxy service module
//!
//! This module implements the relay itself: the listener, the per-connection
//! session, and the unidirectional byte copy.

pub mod server;
pub mod handler;
pub mod forwarder;

pub use server::{ListenerConfig, Proxy};
pub use handler::{ConnectionSession, SessionOutcome, SessionReport, SessionSettings, SessionState};
pub use forwarder::{Direction, RelayOutcome, RelayReport, RelayTask};
