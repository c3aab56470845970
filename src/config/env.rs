//! Environment variable overrides.
//!
//! The proxies are deployed as systemd units, so the environment is the
//! primary way operators adjust socket paths and upstream timeouts.

use std::path::PathBuf;

use crate::config::schema::ProxyConfig;

/// Path for the proxy's listening socket.
pub const LISTEN_SOCKET: &str = "LISTEN_SOCKET";

/// Path of the upstream database socket.
pub const UPSTREAM_SOCKET: &str = "UPSTREAM_SOCKET";

/// Upstream call timeout in seconds, `0` disables it.
pub const PROXY_CLIENT_TIMEOUT_SECONDS: &str = "PROXY_CLIENT_TIMEOUT_SECONDS";

/// Older name for [`PROXY_CLIENT_TIMEOUT_SECONDS`], consulted when it is unset.
pub const CLIENT_TIMEOUT_SECONDS: &str = "CLIENT_TIMEOUT_SECONDS";

/// Upstream connect timeout in seconds.
pub const PROXY_DIAL_TIMEOUT_SECONDS: &str = "PROXY_DIAL_TIMEOUT_SECONDS";

/// Read a variable from the process environment, treating empty as unset.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Apply environment overrides on top of `config`.
///
/// `lookup` returns the value for a key, or `None` when unset. Unparsable
/// numbers are logged and leave the current value in place.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(path) = lookup(LISTEN_SOCKET) {
        config.listener.socket_path = PathBuf::from(path);
    }
    if let Some(path) = lookup(UPSTREAM_SOCKET) {
        config.upstream.socket_path = PathBuf::from(path);
    }

    let client_timeout = lookup(PROXY_CLIENT_TIMEOUT_SECONDS)
        .map(|v| (PROXY_CLIENT_TIMEOUT_SECONDS, v))
        .or_else(|| lookup(CLIENT_TIMEOUT_SECONDS).map(|v| (CLIENT_TIMEOUT_SECONDS, v)));
    if let Some((key, value)) = client_timeout {
        if let Some(secs) = parse_seconds(key, &value) {
            config.timeouts.client_secs = secs;
        }
    }

    if let Some(value) = lookup(PROXY_DIAL_TIMEOUT_SECONDS) {
        if let Some(secs) = parse_seconds(PROXY_DIAL_TIMEOUT_SECONDS, &value) {
            config.timeouts.dial_secs = secs;
        }
    }
}

fn parse_seconds(key: &str, value: &str) -> Option<u64> {
    match value.trim().parse::<u64>() {
        Ok(secs) => Some(secs),
        Err(e) => {
            tracing::warn!(key, value, error = %e, "Ignoring invalid timeout override");
            None
        }
    }
}
