//! Security-filtering reverse proxy for ArangoDB's Unix socket.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::{AccessMode, ProxyConfig};
pub use error::{ProxyError, Result};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
