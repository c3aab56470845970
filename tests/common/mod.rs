//! Shared utilities for integration testing.
//!
//! Everything runs over Unix sockets in a temporary directory: a mock
//! ArangoDB that records what it receives, the proxy under test, and a
//! minimal HTTP/1.1 client.

#![allow(dead_code)]

use arango_socket_proxy::config::{AccessMode, ProxyConfig};
use arango_socket_proxy::http::HttpServer;
use arango_socket_proxy::lifecycle::Shutdown;
use arango_socket_proxy::net::Listener;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A request as seen by the mock database.
#[derive(Debug)]
pub struct Recorded {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// What the mock database answers.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub delay: Duration,
}

impl MockResponse {
    pub fn ok(body: &'static str) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(body.as_bytes()),
            delay: Duration::ZERO,
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.append(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Start a mock database on `path`. Every request it receives is sent to the
/// returned channel before the response goes out.
pub fn start_upstream<F>(path: &Path, respond: F) -> mpsc::UnboundedReceiver<Recorded>
where
    F: Fn(&Recorded) -> MockResponse + Send + Sync + 'static,
{
    let listener = UnixListener::bind(path).unwrap();
    let respond = Arc::new(respond);
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let respond = Arc::clone(&respond);
            let tx = tx.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let respond = Arc::clone(&respond);
                    let tx = tx.clone();
                    async move {
                        let (parts, body) = req.into_parts();
                        let body = body
                            .collect()
                            .await
                            .map(|c| c.to_bytes())
                            .unwrap_or_default();
                        let recorded = Recorded {
                            method: parts.method,
                            uri: parts.uri.to_string(),
                            headers: parts.headers,
                            body,
                        };
                        let mock = (*respond)(&recorded);
                        let _ = tx.send(recorded);

                        if !mock.delay.is_zero() {
                            tokio::time::sleep(mock.delay).await;
                        }
                        let mut response = Response::new(Full::new(mock.body));
                        *response.status_mut() = mock.status;
                        response.headers_mut().extend(mock.headers);
                        Ok::<_, Infallible>(response)
                    }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    rx
}

/// Socket paths for one test, removed with the directory.
pub struct Sockets {
    pub dir: TempDir,
    pub proxy: PathBuf,
    pub upstream: PathBuf,
}

impl Sockets {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let proxy = dir.path().join("run/proxy.sock");
        let upstream = dir.path().join("db.sock");
        Self {
            dir,
            proxy,
            upstream,
        }
    }

    pub fn config(&self, mode: AccessMode) -> ProxyConfig {
        let mut config = ProxyConfig::for_mode(mode);
        config.listener.socket_path = self.proxy.clone();
        config.upstream.socket_path = self.upstream.clone();
        config.timeouts.dial_secs = 1;
        config.timeouts.shutdown_grace_secs = 1;
        config
    }
}

/// A proxy serving in the background.
pub struct TestProxy {
    pub socket: PathBuf,
    shutdown: Shutdown,
    handle: JoinHandle<()>,
}

impl TestProxy {
    pub fn start(config: &ProxyConfig, mode: AccessMode) -> Self {
        let listener = Listener::bind(&config.listener).unwrap();
        let server = HttpServer::new(config, mode);
        let shutdown = Shutdown::new();
        let stop = shutdown.clone();
        let handle = tokio::spawn(async move { server.run(listener, &stop).await });

        Self {
            socket: config.listener.socket_path.clone(),
            shutdown,
            handle,
        }
    }

    /// Trigger shutdown and wait for the server to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("proxy did not stop")
            .unwrap();
    }
}

/// Build a request for the proxy.
pub fn request(method: Method, uri: &str, body: impl Into<Bytes>) -> Request<Full<Bytes>> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "localhost")
        .body(Full::new(body.into()))
        .unwrap()
}

/// Send one request over a fresh connection to `socket`.
pub async fn send(socket: &Path, request: Request<Full<Bytes>>) -> (StatusCode, HeaderMap, Bytes) {
    let stream = UnixStream::connect(socket).await.unwrap();
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let response = sender.send_request(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let body = body.collect().await.unwrap().to_bytes();
    (parts.status, parts.headers, body)
}

/// Assert the mock database received nothing within a short window.
pub async fn assert_nothing_forwarded(rx: &mut mpsc::UnboundedReceiver<Recorded>) {
    let received = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(
        !matches!(received, Ok(Some(_))),
        "request unexpectedly reached the upstream"
    );
}

/// Receive the next request the mock database saw.
pub async fn next_forwarded(rx: &mut mpsc::UnboundedReceiver<Recorded>) -> Recorded {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no request reached the upstream")
        .expect("mock upstream stopped")
}
