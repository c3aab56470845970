//! Upstream connector and pooled client.
//!
//! # Responsibilities
//! - Dial the database's Unix socket (and nothing else) with a connect timeout
//! - Expose the socket to hyper's pooled client as a transport
//! - Choose HTTP/1.1 or HTTP/2 prior knowledge for the upstream leg
//!
//! # Design Decisions
//! - The request URI's authority is ignored when dialing; every request goes
//!   to the configured socket
//! - Connect errors carry the socket path so 502 bodies say what failed

use axum::body::Body;
use axum::http::Uri;
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::net::UnixStream;

use crate::config::ProxyConfig;

/// Pooled HTTP client bound to the upstream socket.
pub type UpstreamClient = Client<UnixConnector, Body>;

/// A connector that always dials one Unix socket.
#[derive(Debug, Clone)]
pub struct UnixConnector {
    socket_path: Arc<PathBuf>,
    dial_timeout: Duration,
}

impl UnixConnector {
    pub fn new(socket_path: impl Into<PathBuf>, dial_timeout: Duration) -> Self {
        Self {
            socket_path: Arc::new(socket_path.into()),
            dial_timeout,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl tower::Service<Uri> for UnixConnector {
    type Response = UpstreamStream;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = io::Result<UpstreamStream>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _uri: Uri) -> Self::Future {
        let path = Arc::clone(&self.socket_path);
        let dial_timeout = self.dial_timeout;
        Box::pin(async move {
            match tokio::time::timeout(dial_timeout, UnixStream::connect(path.as_path())).await {
                Ok(Ok(stream)) => Ok(UpstreamStream {
                    io: TokioIo::new(stream),
                }),
                Ok(Err(e)) => Err(io::Error::new(
                    e.kind(),
                    format!("dial unix {}: {e}", path.display()),
                )),
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("dial unix {}: timed out after {dial_timeout:?}", path.display()),
                )),
            }
        })
    }
}

/// A connected upstream socket.
#[derive(Debug)]
pub struct UpstreamStream {
    io: TokioIo<UnixStream>,
}

impl Connection for UpstreamStream {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}

impl hyper::rt::Read for UpstreamStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: hyper::rt::ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        hyper::rt::Read::poll_read(Pin::new(&mut self.get_mut().io), cx, buf)
    }
}

impl hyper::rt::Write for UpstreamStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        hyper::rt::Write::poll_write(Pin::new(&mut self.get_mut().io), cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_flush(Pin::new(&mut self.get_mut().io), cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_shutdown(Pin::new(&mut self.get_mut().io), cx)
    }

    fn is_write_vectored(&self) -> bool {
        hyper::rt::Write::is_write_vectored(&self.io)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        hyper::rt::Write::poll_write_vectored(Pin::new(&mut self.get_mut().io), cx, bufs)
    }
}

/// Build the pooled upstream client from configuration.
pub fn build_client(config: &ProxyConfig) -> UpstreamClient {
    let connector = UnixConnector::new(
        config.upstream.socket_path.clone(),
        config.timeouts.dial(),
    );

    if config.upstream.http2 {
        tracing::info!(
            socket = %config.upstream.socket_path.display(),
            "Upstream protocol: HTTP/2 (prior knowledge)"
        );
    } else {
        tracing::info!(
            socket = %config.upstream.socket_path.display(),
            "Upstream protocol: HTTP/1.1"
        );
    }

    Client::builder(TokioExecutor::new())
        .pool_timer(TokioTimer::new())
        .pool_idle_timeout(Duration::from_secs(config.upstream.pool_idle_secs))
        .http2_only(config.upstream.http2)
        .build(connector)
}
