//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → access_control.rs (method/path allow-lists, AQL keyword scan)
//!     → limits.rs (how much body the scan may buffer)
//!     → headers.rs (strip hop-by-hop headers both ways)
//!     → Pass to the forwarding engine
//! ```
//!
//! # Design Decisions
//! - Fail closed: a body that cannot be inspected is never forwarded
//! - No trust in client input: paths are decoded before matching

pub mod access_control;
pub mod headers;
pub mod limits;

pub use access_control::{policy_for, AccessPolicy, Decision, ReadOnlyPolicy, ReadWritePolicy};
