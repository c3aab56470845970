//! Access policies for the read-only and read-write sockets.
//!
//! A policy sees the method, the decoded path and a [`BodyPeeker`], and
//! returns one of three outcomes: `Ok(Decision::Allow)`,
//! `Ok(Decision::Deny(reason))`, or `Err(InspectionError)` when the body it
//! needed could not be read. Policies hold no state, so a single instance is
//! shared by every request on a socket.

use async_trait::async_trait;
use axum::http::Method;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::config::AccessMode;
use crate::http::body::{BodyPeeker, InspectionError};
use crate::routing::matcher::{has_api_prefix, is_cursor_endpoint};
use crate::security::limits::CURSOR_PEEK_LIMIT;

/// AQL keywords that indicate a write operation.
pub const FORBIDDEN_AQL_KEYWORDS: [&str; 7] = [
    "INSERT", "UPDATE", "UPSERT", "REMOVE", "REPLACE", "TRUNCATE", "DROP",
];

/// API prefixes on which the read-write policy accepts POST.
pub const RW_POST_API_PATHS: [&str; 4] = [
    "/_api/document",
    "/_api/collection",
    "/_api/index",
    "/_api/import",
];

/// API prefixes on which the read-write policy accepts PUT, PATCH and DELETE.
/// Import is POST-only.
pub const RW_MUTATION_API_PATHS: [&str; 3] = ["/_api/document", "/_api/collection", "/_api/index"];

/// Outcome of a policy check that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// A request filter applied before anything reaches the database.
#[async_trait]
pub trait AccessPolicy: Send + Sync + std::fmt::Debug {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Decide whether `method` on `path` may be forwarded. May peek at the
    /// body through `peeker`.
    async fn evaluate(
        &self,
        method: &Method,
        path: &str,
        peeker: &mut BodyPeeker,
    ) -> Result<Decision, InspectionError>;
}

/// Build the policy for a proxy mode.
pub fn policy_for(mode: AccessMode) -> Arc<dyn AccessPolicy> {
    match mode {
        AccessMode::ReadOnly => Arc::new(ReadOnlyPolicy),
        AccessMode::ReadWrite => Arc::new(ReadWritePolicy::new()),
    }
}

/// Allows reads, cursor cleanup, and cursor queries without write keywords.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnlyPolicy;

#[async_trait]
impl AccessPolicy for ReadOnlyPolicy {
    fn name(&self) -> &'static str {
        AccessMode::ReadOnly.as_str()
    }

    async fn evaluate(
        &self,
        method: &Method,
        path: &str,
        peeker: &mut BodyPeeker,
    ) -> Result<Decision, InspectionError> {
        match *method {
            Method::GET | Method::HEAD | Method::OPTIONS => Ok(Decision::Allow),
            Method::POST if is_cursor_endpoint(path) => {
                let body = peeker.peek(CURSOR_PEEK_LIMIT).await?;
                Ok(scan_cursor_body(&body))
            }
            // Deleting a cursor only frees server-side results.
            Method::DELETE if is_cursor_endpoint(path) => Ok(Decision::Allow),
            _ => Ok(not_permitted(method, path)),
        }
    }
}

/// Everything the read-only policy allows, plus document, collection, index
/// and import writes and write queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadWritePolicy {
    read_only: ReadOnlyPolicy,
}

impl ReadWritePolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessPolicy for ReadWritePolicy {
    fn name(&self) -> &'static str {
        AccessMode::ReadWrite.as_str()
    }

    async fn evaluate(
        &self,
        method: &Method,
        path: &str,
        peeker: &mut BodyPeeker,
    ) -> Result<Decision, InspectionError> {
        // An inspection error here is not final: cursor writes are allowed
        // below, and the engine refuses to forward a body that failed to read.
        if let Ok(Decision::Allow) = self.read_only.evaluate(method, path, peeker).await {
            return Ok(Decision::Allow);
        }

        let allowed = match *method {
            Method::POST => {
                is_cursor_endpoint(path)
                    || RW_POST_API_PATHS.iter().any(|api| has_api_prefix(path, api))
            }
            Method::PUT | Method::PATCH | Method::DELETE => {
                RW_MUTATION_API_PATHS.iter().any(|api| has_api_prefix(path, api))
            }
            _ => false,
        };

        if allowed {
            Ok(Decision::Allow)
        } else {
            Ok(not_permitted(method, path))
        }
    }
}

fn not_permitted(method: &Method, path: &str) -> Decision {
    Decision::Deny(format!("method {method} not permitted on {path}"))
}

/// The `query` string of a cursor body, if the body is a JSON object that
/// carries one. Arrays and other JSON values do not count.
fn cursor_query(body: &[u8]) -> Option<String> {
    let object: Map<String, Value> = serde_json::from_slice(body).ok()?;
    match object.get("query") {
        Some(Value::String(query)) => Some(query.clone()),
        _ => None,
    }
}

/// Scan a cursor request body for write keywords.
///
/// A JSON object with a non-empty `query` string is tokenized into runs of letters, so
/// identifiers like `updatedAt` do not trip `UPDATE`. Anything else gets a
/// plain substring scan of the whole body, which is stricter on purpose.
pub fn scan_cursor_body(body: &[u8]) -> Decision {
    if let Some(query) = cursor_query(body) {
        if !query.is_empty() {
            let upper = query.to_uppercase();
            let forbidden = upper
                .split(|c: char| !c.is_ascii_uppercase())
                .find(|token| FORBIDDEN_AQL_KEYWORDS.contains(token));
            return match forbidden {
                Some(token) => {
                    Decision::Deny(format!("forbidden keyword {token:?} detected in AQL"))
                }
                None => Decision::Allow,
            };
        }
    }

    let upper = String::from_utf8_lossy(body).to_uppercase();
    match FORBIDDEN_AQL_KEYWORDS.iter().find(|kw| upper.contains(*kw)) {
        Some(keyword) => {
            Decision::Deny(format!("forbidden keyword {keyword:?} detected in request body"))
        }
        None => Decision::Allow,
    }
}
