//! Hop-by-hop header stripping.
//!
//! # Responsibilities
//! - Remove headers nominated by `Connection`
//! - Remove the standard hop-by-hop headers
//! - Replace a destination header set wholesale with a sanitized copy
//!
//! # Design Decisions
//! - Sanitizing works on a copy; the source map is never mutated
//! - Destination maps are cleared before repopulation, never merged
//! - Applied to requests going upstream and responses going to the client

use axum::http::header::{HeaderMap, HeaderName, CONNECTION};

/// Headers that only describe a single connection leg.
pub const HOP_BY_HOP_HEADERS: [&str; 7] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Return a copy of `headers` with every hop-by-hop header removed.
pub fn sanitize(headers: &HeaderMap) -> HeaderMap {
    let mut cleaned = headers.clone();

    let nominated: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter_map(|name| HeaderName::from_bytes(name.as_bytes()).ok())
        .collect();
    for name in nominated {
        cleaned.remove(name);
    }

    for name in HOP_BY_HOP_HEADERS {
        cleaned.remove(name);
    }

    cleaned
}

/// Replace the contents of `dst` with the sanitized headers of `src`.
pub fn copy_headers(dst: &mut HeaderMap, src: &HeaderMap) {
    dst.clear();
    dst.extend(sanitize(src));
}
