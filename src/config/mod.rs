//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! access mode (read-only / read-write)
//!     → schema.rs (mode defaults)
//!     → loader.rs (optional TOML file)
//!     → env.rs (LISTEN_SOCKET, UPSTREAM_SOCKET, timeouts)
//!     → CLI flags (main.rs)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::AccessMode;
pub use schema::ListenerConfig;
pub use schema::ProxyConfig;
pub use schema::TimeoutConfig;
pub use schema::UpstreamConfig;
