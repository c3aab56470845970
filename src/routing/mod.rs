//! Routing subsystem.
//!
//! There is a single upstream, so "routing" here means classifying a request
//! path for the access policies rather than choosing a backend.
//!
//! # Data Flow
//! ```text
//! Raw request path
//!     → matcher::decode_path (percent-decoding)
//!     → matcher::is_cursor_endpoint / matcher::has_api_prefix
//!     → consumed by security::access_control
//! ```
//!
//! # Design Decisions
//! - Pure functions, no state, safe to call from any task
//! - No regex in hot path (prefix and segment scans only)
//! - Deterministic: same input always yields the same answer

pub mod matcher;

pub use matcher::{decode_path, has_api_prefix, is_cursor_endpoint};
