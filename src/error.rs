//! Error types for the proxy.
//!
//! Per-request failures never surface here: the forwarding engine turns them
//! into HTTP responses. `ProxyError` covers startup and serving faults, which
//! are fatal for the process.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::loader::ConfigError;

/// Errors that can occur while starting or running a proxy.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to prepare directory for {path}: {source}")]
    SocketDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove existing socket {path}: {source}")]
    StaleSocket {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to listen on {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to chmod {path}: {source}")]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid metrics address {addr}: {reason}")]
    Metrics { addr: String, reason: String },

    #[error("proxy server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;
