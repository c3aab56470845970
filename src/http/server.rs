//! HTTP server setup and the forwarding engine.
//!
//! # Responsibilities
//! - Build the Axum router: request logging plus a catch-all proxy handler
//! - Serve HTTP/1.1 connections accepted from the Unix listener
//! - Apply read, write and idle timeouts per connection
//! - Run the access policy before anything reaches the database
//! - Forward allowed requests over the pooled upstream client
//! - Drain connections on shutdown
//!
//! # Data Flow
//! ```text
//! accepted stream
//!     → hyper http1 connection (header read timeout, idle watchdog)
//!     → tower-http body timeouts
//!     → request::log_requests (request id, span)
//!     → proxy_handler:
//!         decode path → policy.evaluate → {403 | build upstream request}
//!         → client.request (client timeout) → {502 | relay response}
//! ```

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Uri},
    middleware,
    response::Response,
    Router,
};
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::timeout::{RequestBodyTimeoutLayer, ResponseBodyTimeoutLayer};

use crate::config::{AccessMode, ProxyConfig, TimeoutConfig};
use crate::http::body::{BodyPeeker, PeekedBody};
use crate::http::request::log_requests;
use crate::http::response::{bad_gateway, error_chain, forbidden, internal_error, relay_body};
use crate::lifecycle::Shutdown;
use crate::net::{build_client, ActivityClock, ActivityStream, ConnectionTracker, Listener, UpstreamClient};
use crate::observability::metrics::{self, Outcome};
use crate::routing::decode_path;
use crate::security::headers::{copy_headers, sanitize};
use crate::security::{policy_for, AccessPolicy, Decision};

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub mode: AccessMode,
    pub policy: Arc<dyn AccessPolicy>,
    pub client: UpstreamClient,
    pub upstream_host: Arc<str>,
    pub client_timeout: Option<Duration>,
}

/// HTTP server for one proxy socket.
pub struct HttpServer {
    router: Router,
    timeouts: TimeoutConfig,
    mode: AccessMode,
}

impl HttpServer {
    /// Create a server for `mode` with the given configuration.
    pub fn new(config: &ProxyConfig, mode: AccessMode) -> Self {
        let state = AppState {
            mode,
            policy: policy_for(mode),
            client: build_client(config),
            upstream_host: Arc::from(config.upstream.host.as_str()),
            client_timeout: config.timeouts.client(),
        };

        Self {
            router: Self::build_router(state),
            timeouts: config.timeouts.clone(),
            mode,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(middleware::from_fn(log_requests))
    }

    /// Serve connections from `listener` until `shutdown` fires, then drain.
    pub async fn run(self, listener: Listener, shutdown: &Shutdown) {
        let service = ServiceBuilder::new()
            .layer(RequestBodyTimeoutLayer::new(self.timeouts.read()))
            .layer(ResponseBodyTimeoutLayer::new(self.timeouts.write()))
            .service(self.router);

        let tracker = ConnectionTracker::new();
        let mut stop = shutdown.subscribe();

        tracing::info!(
            mode = %self.mode,
            socket = %listener.path().display(),
            "Proxy listening"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, permit) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to accept connection");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                    };

                    let guard = tracker.track();
                    let service = TowerToHyperService::new(service.clone());
                    let mut conn_stop = shutdown.subscribe();
                    let read_timeout = self.timeouts.read();
                    let idle_timeout = self.timeouts.idle();

                    tokio::spawn(async move {
                        let _permit = permit;
                        let clock = Arc::new(ActivityClock::new());
                        let io = TokioIo::new(ActivityStream::new(stream, Arc::clone(&clock)));

                        let conn = http1::Builder::new()
                            .timer(TokioTimer::new())
                            .header_read_timeout(read_timeout)
                            .keep_alive(true)
                            .serve_connection(io, service);
                        tokio::pin!(conn);

                        let mut draining = false;
                        loop {
                            tokio::select! {
                                result = conn.as_mut() => {
                                    if let Err(e) = result {
                                        tracing::debug!(connection_id = %guard.id(), error = %e, "Connection ended with error");
                                    }
                                    break;
                                }
                                _ = clock.idle_for(idle_timeout), if !draining => {
                                    tracing::debug!(connection_id = %guard.id(), "Closing idle connection");
                                    conn.as_mut().graceful_shutdown();
                                    draining = true;
                                }
                                _ = conn_stop.recv(), if !draining => {
                                    conn.as_mut().graceful_shutdown();
                                    draining = true;
                                }
                            }
                        }
                    });
                }
                _ = stop.recv() => break,
            }
        }

        tracing::info!(
            active_connections = tracker.active_count(),
            "Stopped accepting connections, draining"
        );
        if !tracker.drain(self.timeouts.shutdown_grace()).await {
            tracing::warn!(
                active_connections = tracker.active_count(),
                "Shutdown grace period elapsed with connections still open"
            );
        }

        listener.close();
        tracing::info!(mode = %self.mode, "HTTP server stopped");
    }
}

/// Absolute upstream URI: synthetic host, raw path, raw query when non-empty.
pub fn upstream_uri(host: &str, inbound: &Uri) -> Result<Uri, axum::http::Error> {
    let target = match inbound.query() {
        Some(query) if !query.is_empty() => format!("{}?{}", inbound.path(), query),
        _ => inbound.path().to_string(),
    };

    Uri::builder()
        .scheme("http")
        .authority(host)
        .path_and_query(target)
        .build()
}

/// Catch-all handler: check the policy, then forward or reject.
async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    let start = Instant::now();
    let mode = state.mode.as_str();
    let (parts, body) = request.into_parts();
    let path = decode_path(parts.uri.path()).into_owned();

    let mut peeker = BodyPeeker::new(body);
    match state.policy.evaluate(&parts.method, &path, &mut peeker).await {
        Ok(Decision::Allow) => {}
        Ok(Decision::Deny(reason)) => {
            tracing::warn!(policy = state.policy.name(), reason = %reason, "Request denied");
            metrics::record_request(mode, Outcome::Denied, 403, start);
            return forbidden(&reason);
        }
        Err(e) => {
            tracing::warn!(policy = state.policy.name(), error = %e, "Request body inspection failed");
            metrics::record_request(mode, Outcome::InspectionFailed, 403, start);
            return forbidden(&e.to_string());
        }
    }

    let (body, snapshot_len) = match peeker.into_body() {
        PeekedBody::Untouched(body) => (body, None),
        PeekedBody::Snapshot(bytes) => {
            let len = bytes.len();
            (Body::from(bytes), Some(len))
        }
        PeekedBody::Failed(e) => {
            tracing::warn!(error = %e, "Refusing to forward a body that failed inspection");
            metrics::record_request(mode, Outcome::InspectionFailed, 403, start);
            return forbidden(&e.to_string());
        }
    };

    let upstream_request = upstream_uri(&state.upstream_host, &parts.uri).and_then(|uri| {
        axum::http::Request::builder()
            .method(parts.method.clone())
            .uri(uri)
            .body(body)
    });
    let mut upstream_request = match upstream_request {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build upstream request");
            metrics::record_request(mode, Outcome::InternalError, 500, start);
            return internal_error("failed to build upstream request");
        }
    };

    let headers = upstream_request.headers_mut();
    copy_headers(headers, &parts.headers);
    headers.remove(header::HOST);
    if let Some(len) = snapshot_len {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }

    tracing::debug!(upstream = %upstream_request.uri().path(), "Forwarding request");

    // A timeout too large to represent as an instant means no deadline.
    let deadline = state
        .client_timeout
        .and_then(|timeout| tokio::time::Instant::now().checked_add(timeout));
    let sent = state.client.request(upstream_request);
    let result = match deadline {
        Some(at) => match tokio::time::timeout_at(at, sent).await {
            Ok(result) => result.map_err(|e| error_chain(&e)),
            Err(_) => Err("client timeout exceeded while awaiting headers".to_string()),
        },
        None => sent.await.map_err(|e| error_chain(&e)),
    };

    let upstream_response = match result {
        Ok(response) => response,
        Err(cause) => {
            tracing::error!(error = %cause, "Upstream request failed");
            metrics::record_request(mode, Outcome::UpstreamError, 502, start);
            return bad_gateway(&cause);
        }
    };

    let (mut head, body) = upstream_response.into_parts();
    head.headers = sanitize(&head.headers);
    metrics::record_request(mode, Outcome::Allowed, head.status.as_u16(), start);

    Response::from_parts(head, relay_body(body, deadline))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_uri_keeps_raw_path_and_query() {
        let inbound: Uri = "/_db/my%20db/_api/cursor?batchSize=10&x=%2F".parse().unwrap();
        let uri = upstream_uri("arangodb", &inbound).unwrap();
        assert_eq!(
            uri.to_string(),
            "http://arangodb/_db/my%20db/_api/cursor?batchSize=10&x=%2F"
        );
    }

    #[test]
    fn upstream_uri_drops_empty_query() {
        let inbound: Uri = "/_api/version?".parse().unwrap();
        let uri = upstream_uri("arangodb", &inbound).unwrap();
        assert_eq!(uri.to_string(), "http://arangodb/_api/version");

        let inbound: Uri = "/_api/version".parse().unwrap();
        let uri = upstream_uri("arangodb", &inbound).unwrap();
        assert_eq!(uri.authority().unwrap().as_str(), "arangodb");
        assert_eq!(uri.path(), "/_api/version");
        assert_eq!(uri.query(), None);
    }

    #[test]
    fn upstream_uri_from_absolute_form() {
        let inbound: Uri = "http://client.example/_api/version?details=true".parse().unwrap();
        let uri = upstream_uri("arangodb", &inbound).unwrap();
        assert_eq!(uri.to_string(), "http://arangodb/_api/version?details=true");
    }

    #[test]
    fn upstream_uri_rejects_bad_host() {
        let inbound: Uri = "/_api/version".parse().unwrap();
        assert!(upstream_uri("bad host", &inbound).is_err());
    }
}
