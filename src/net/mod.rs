//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Unix socket connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (lifecycle tracking, idle clock)
//!     → Hand off to HTTP layer
//!
//! Outgoing:
//!     HTTP layer → upstream.rs (pooled client, dials the database socket)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - The upstream connector has exactly one destination

pub mod connection;
pub mod listener;
pub mod upstream;

pub use connection::{ActivityClock, ActivityStream, ConnectionTracker};
pub use listener::Listener;
pub use upstream::{build_client, UnixConnector, UpstreamClient};
