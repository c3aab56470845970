//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default path to ArangoDB's Unix socket.
pub const DEFAULT_UPSTREAM_SOCKET: &str = "/run/arangodb3/arangodb.sock";

/// Default path for the read-only proxy socket.
pub const DEFAULT_RO_LISTEN_SOCKET: &str = "/run/arango-proxy/readonly.sock";

/// Default path for the read-write proxy socket.
pub const DEFAULT_RW_LISTEN_SOCKET: &str = "/run/arango-proxy/readwrite.sock";

/// Permission bits for the read-only socket (owner rw, group r).
pub const RO_SOCKET_MODE: u32 = 0o640;

/// Permission bits for the read-write socket (owner only).
pub const RW_SOCKET_MODE: u32 = 0o600;

/// Synthetic host name used for every upstream request.
pub const DEFAULT_UPSTREAM_HOST: &str = "arangodb";

/// Which privilege level a proxy instance serves.
///
/// The mode only selects defaults and the policy; which clients may reach the
/// socket is decided by filesystem permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    /// Short label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::ReadOnly => "read-only",
            AccessMode::ReadWrite => "read-write",
        }
    }

    fn default_listen_socket(&self) -> &'static str {
        match self {
            AccessMode::ReadOnly => DEFAULT_RO_LISTEN_SOCKET,
            AccessMode::ReadWrite => DEFAULT_RW_LISTEN_SOCKET,
        }
    }

    fn default_socket_mode(&self) -> u32 {
        match self {
            AccessMode::ReadOnly => RO_SOCKET_MODE,
            AccessMode::ReadWrite => RW_SOCKET_MODE,
        }
    }
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listening socket configuration.
    pub listener: ListenerConfig,

    /// Upstream database socket configuration.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Defaults for the given access mode.
    pub fn for_mode(mode: AccessMode) -> Self {
        Self {
            listener: ListenerConfig::for_mode(mode),
            ..Self::default()
        }
    }
}

/// Listening socket configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Path of the Unix socket clients connect to.
    pub socket_path: PathBuf,

    /// Permission bits applied to the socket file after bind.
    pub socket_mode: u32,

    /// Maximum concurrent client connections (backpressure).
    pub max_connections: usize,
}

impl ListenerConfig {
    pub fn for_mode(mode: AccessMode) -> Self {
        Self {
            socket_path: PathBuf::from(mode.default_listen_socket()),
            socket_mode: mode.default_socket_mode(),
            max_connections: 1024,
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self::for_mode(AccessMode::ReadOnly)
    }
}

/// Upstream database socket configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Path of the database's Unix socket.
    pub socket_path: PathBuf,

    /// Host name placed in upstream request URIs.
    pub host: String,

    /// Speak HTTP/2 (prior knowledge) to the upstream instead of HTTP/1.1.
    pub http2: bool,

    /// How long an idle pooled upstream connection is kept, in seconds.
    pub pool_idle_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_UPSTREAM_SOCKET),
            host: DEFAULT_UPSTREAM_HOST.to_string(),
            http2: false,
            pool_idle_secs: 90,
        }
    }
}

/// Timeout configuration for the inbound and upstream legs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total upstream call timeout in seconds; 0 disables it.
    pub client_secs: u64,

    /// Upstream socket connect timeout in seconds.
    pub dial_secs: u64,

    /// Time allowed for reading an inbound request, in seconds.
    pub read_secs: u64,

    /// Time allowed for writing the response, in seconds.
    pub write_secs: u64,

    /// Keep-alive idle timeout for client connections, in seconds.
    pub idle_secs: u64,

    /// How long shutdown waits for in-flight connections, in seconds.
    pub shutdown_grace_secs: u64,
}

impl TimeoutConfig {
    /// Upstream call timeout, `None` when disabled.
    pub fn client(&self) -> Option<Duration> {
        (self.client_secs > 0).then(|| Duration::from_secs(self.client_secs))
    }

    pub fn dial(&self) -> Duration {
        Duration::from_secs(self.dial_secs)
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    pub fn write(&self) -> Duration {
        Duration::from_secs(self.write_secs)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            client_secs: 120,
            dial_secs: 10,
            read_secs: 30,
            write_secs: 120,
            idle_secs: 120,
            shutdown_grace_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when `RUST_LOG` is unset (trace, debug, info, warn, error).
    pub log_level: String,

    /// Prometheus exporter bind address. No exporter when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_address: None,
        }
    }
}
