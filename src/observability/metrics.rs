//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (requests, latency, connections)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by mode, outcome, status
//! - `proxy_request_duration_seconds` (histogram): latency by mode, outcome
//! - `proxy_active_connections` (gauge): current client connection count
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Outcome labels are a closed set, see [`Outcome`]

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::error::{ProxyError, Result};

pub const REQUESTS_TOTAL: &str = "proxy_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "proxy_request_duration_seconds";
pub const ACTIVE_CONNECTIONS: &str = "proxy_active_connections";

/// How a request left the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Forwarded and relayed.
    Allowed,
    /// Rejected by the access policy.
    Denied,
    /// Body could not be read for inspection.
    InspectionFailed,
    /// Upstream transport failure or timeout.
    UpstreamError,
    /// The proxy could not build the upstream request.
    InternalError,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Allowed => "allowed",
            Outcome::Denied => "denied",
            Outcome::InspectionFailed => "inspection_failed",
            Outcome::UpstreamError => "upstream_error",
            Outcome::InternalError => "internal_error",
        }
    }
}

/// Install the Prometheus exporter on `address`.
pub fn init_metrics(address: &str) -> Result<()> {
    let addr: SocketAddr = address.parse().map_err(|e: std::net::AddrParseError| {
        ProxyError::Metrics {
            addr: address.to_string(),
            reason: e.to_string(),
        }
    })?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| ProxyError::Metrics {
            addr: address.to_string(),
            reason: e.to_string(),
        })?;

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one finished request.
pub fn record_request(mode: &'static str, outcome: Outcome, status: u16, start: Instant) {
    ::metrics::counter!(
        REQUESTS_TOTAL,
        "mode" => mode,
        "outcome" => outcome.as_str(),
        "status" => status.to_string()
    )
    .increment(1);

    ::metrics::histogram!(
        REQUEST_DURATION_SECONDS,
        "mode" => mode,
        "outcome" => outcome.as_str()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn set_active_connections(count: u64) {
    ::metrics::gauge!(ACTIVE_CONNECTIONS).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels() {
        assert_eq!(Outcome::Allowed.as_str(), "allowed");
        assert_eq!(Outcome::Denied.as_str(), "denied");
        assert_eq!(Outcome::InspectionFailed.as_str(), "inspection_failed");
        assert_eq!(Outcome::UpstreamError.as_str(), "upstream_error");
        assert_eq!(Outcome::InternalError.as_str(), "internal_error");
    }

    #[test]
    fn bad_address_is_rejected() {
        let err = init_metrics("not-an-address").unwrap_err();
        assert!(matches!(err, ProxyError::Metrics { .. }));
    }

    #[test]
    fn recording_without_exporter_is_harmless() {
        record_request("read-only", Outcome::Denied, 403, Instant::now());
        set_active_connections(3);
    }
}
