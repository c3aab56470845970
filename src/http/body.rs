//! Single-use, memoizing request body reader.
//!
//! The policy layer may need to look at a request body before deciding, but
//! the same bytes must still reach the upstream afterwards. `BodyPeeker` owns
//! the live body and reads it at most once; every later peek returns the same
//! snapshot (or the same error), and the forwarding engine takes back either
//! the untouched stream or the snapshot.

use axum::body::{Body, HttpBody};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use thiserror::Error;

use crate::security::limits::effective_peek_limit;

/// Why a body could not be inspected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InspectionError {
    #[error("request body exceeds inspection limit ({limit} bytes)")]
    LimitExceeded { limit: usize },

    #[error("failed to read request body: {0}")]
    Read(String),
}

#[derive(Debug)]
enum PeekState {
    /// Body not touched yet.
    Unread(Body),
    /// Body read in full and cached.
    Cached(Bytes),
    /// Request had no body.
    Absent,
    /// Reading failed; the stream is gone.
    Failed(InspectionError),
}

/// What the forwarding engine gets back once the policy is done.
#[derive(Debug)]
pub enum PeekedBody {
    /// Nobody peeked; forward the original stream as is.
    Untouched(Body),
    /// The body was read; forward exactly these bytes.
    Snapshot(Bytes),
    /// The body was consumed but could not be inspected.
    Failed(InspectionError),
}

/// Request-scoped body reader handed to access policies by `&mut`.
#[derive(Debug)]
pub struct BodyPeeker {
    state: PeekState,
}

impl BodyPeeker {
    pub fn new(body: Body) -> Self {
        Self {
            state: PeekState::Unread(body),
        }
    }

    /// Read up to `limit` bytes of the body, or return the cached result.
    ///
    /// `limit <= 0` means the global ceiling. Only the first call reads; its
    /// limit decides whether the body fits. A body of exactly `limit` bytes
    /// fits.
    pub async fn peek(&mut self, limit: i64) -> Result<Bytes, InspectionError> {
        let body = match std::mem::replace(&mut self.state, PeekState::Absent) {
            PeekState::Unread(body) => body,
            done => {
                self.state = done;
                return self.snapshot();
            }
        };

        if body.is_end_stream() {
            return self.snapshot();
        }

        let limit = effective_peek_limit(limit);
        self.state = match Limited::new(body, limit).collect().await {
            Ok(collected) => PeekState::Cached(collected.to_bytes()),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                tracing::warn!(limit, "Request body exceeded inspection limit");
                PeekState::Failed(InspectionError::LimitExceeded { limit })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read request body");
                PeekState::Failed(InspectionError::Read(e.to_string()))
            }
        };

        self.snapshot()
    }

    /// Whether the live body has been consumed.
    pub fn is_consumed(&self) -> bool {
        !matches!(self.state, PeekState::Unread(_))
    }

    /// Hand the body back for forwarding.
    pub fn into_body(self) -> PeekedBody {
        match self.state {
            PeekState::Unread(body) => PeekedBody::Untouched(body),
            PeekState::Cached(bytes) => PeekedBody::Snapshot(bytes),
            PeekState::Absent => PeekedBody::Snapshot(Bytes::new()),
            PeekState::Failed(e) => PeekedBody::Failed(e),
        }
    }

    fn snapshot(&self) -> Result<Bytes, InspectionError> {
        match &self.state {
            PeekState::Cached(bytes) => Ok(bytes.clone()),
            PeekState::Failed(e) => Err(e.clone()),
            PeekState::Absent | PeekState::Unread(_) => Ok(Bytes::new()),
        }
    }
}
