//! Request logging and identification.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) per request
//! - Open a span carrying the ID, method and path for everything downstream
//! - Log completion with status and latency
//!
//! # Design Decisions
//! - Query strings are never logged; AQL bind values and credentials travel there
//! - The ID stays inside the proxy and is not forwarded upstream

use axum::{extract::Request, http::Uri, middleware::Next, response::Response};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Unique identifier of one proxied request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path for logs, with any query replaced by `?<redacted>`.
pub fn redacted_target(uri: &Uri) -> String {
    match uri.query() {
        Some(_) => format!("{}?<redacted>", uri.path()),
        None => uri.path().to_string(),
    }
}

/// Middleware that tags the request with an ID and logs its outcome.
pub async fn log_requests(mut request: Request, next: Next) -> Response {
    let request_id = RequestId::new();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %redacted_target(request.uri()),
    );
    request.extensions_mut().insert(request_id);

    let start = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;

    span.in_scope(|| {
        tracing::info!(
            status = response.status().as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
    });

    response
}
