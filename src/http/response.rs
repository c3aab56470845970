//! Response construction and relaying.
//!
//! # Responsibilities
//! - Plain-text error responses for denials and proxy failures
//! - Relay the upstream body under the per-request deadline
//! - Render error cause chains for 502 bodies
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Once the status line is out, a failing body is logged and the stream is cut

use axum::{
    body::{Body, Bytes, HttpBody},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use hyper::body::{Frame, Incoming, SizeHint};
use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::time::{Instant, Sleep};

type BoxError = Box<dyn StdError + Send + Sync>;

/// Plain-text error response, newline terminated.
pub fn text_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            ),
            (
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ),
        ],
        format!("{message}\n"),
    )
        .into_response()
}

pub fn forbidden(reason: &str) -> Response {
    text_error(StatusCode::FORBIDDEN, reason)
}

pub fn bad_gateway(cause: &str) -> Response {
    text_error(StatusCode::BAD_GATEWAY, &format!("upstream error: {cause}"))
}

pub fn internal_error(message: &str) -> Response {
    text_error(StatusCode::INTERNAL_SERVER_ERROR, message)
}

/// Join an error and its sources with `": "`, skipping repeated messages.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts: Vec<String> = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let message = cause.to_string();
        if !parts.iter().any(|p| p.contains(&message)) {
            parts.push(message);
        }
        source = cause.source();
    }
    parts.join(": ")
}

/// Upstream response body bounded by the request deadline.
pub struct RelayBody {
    inner: Incoming,
    deadline: Option<Pin<Box<Sleep>>>,
    span: tracing::Span,
    done: bool,
}

impl RelayBody {
    pub fn new(inner: Incoming, deadline: Option<Instant>) -> Self {
        Self {
            inner,
            deadline: deadline.map(|at| Box::pin(tokio::time::sleep_until(at))),
            span: tracing::Span::current(),
            done: false,
        }
    }

    fn fail(&mut self, err: BoxError) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        self.done = true;
        self.span.in_scope(|| {
            tracing::warn!(error = %err, "Failed to copy upstream response");
        });
        Poll::Ready(Some(Err(err)))
    }
}

impl HttpBody for RelayBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        if let Some(sleep) = this.deadline.as_mut() {
            if sleep.as_mut().poll(cx).is_ready() {
                return this.fail("client timeout exceeded while reading body".into());
            }
        }

        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Err(e))) => this.fail(Box::new(e)),
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            other => other.map_err(|e| -> BoxError { Box::new(e) }),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.done || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Wrap an upstream body for relaying to the client.
pub fn relay_body(inner: Incoming, deadline: Option<Instant>) -> Body {
    Body::new(RelayBody::new(inner, deadline))
}
