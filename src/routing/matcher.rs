//! ArangoDB path matching.
//!
//! # Responsibilities
//! - Recognize the cursor endpoint, with or without a `/_db/<name>` prefix
//! - Match logical API prefixes at a segment boundary
//! - Reject traversal and malformed database names
//!
//! # Design Decisions
//! - Any `..` in the input rejects a prefix match outright, even though
//!   normalization would also collapse it
//! - Database names are restricted to `[A-Za-z0-9_-]`; anything else fails
//!   the whole match
//! - No regex to guarantee O(n) matching
//! - Matching runs on the percent-decoded path, the same form the database sees

use std::borrow::Cow;

const DB_PREFIX: &str = "/_db/";
const CURSOR_PATH: &str = "/_api/cursor";

/// Returns true if `name` is a non-empty database name of `[A-Za-z0-9_-]`.
pub fn is_valid_database_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Returns true if `path` is exactly the cursor API: an optional
/// `/_db/<name>` prefix, `/_api/cursor`, and an optional numeric cursor id.
pub fn is_cursor_endpoint(path: &str) -> bool {
    let rest = match path.strip_prefix(DB_PREFIX) {
        Some(after) => match after.find('/') {
            Some(idx) if is_valid_database_name(&after[..idx]) => &after[idx..],
            _ => return false,
        },
        None => path,
    };

    let Some(tail) = rest.strip_prefix(CURSOR_PATH) else {
        return false;
    };
    if tail.is_empty() {
        return true;
    }
    match tail.strip_prefix('/') {
        Some(id) => !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Returns true if `path` targets `api_path`, directly or under a validated
/// `/_db/<name>/` prefix, at a path segment boundary.
///
/// `/_api/documentx` never matches `/_api/document`, and neither does
/// `/foo/_api/document`.
pub fn has_api_prefix(path: &str, api_path: &str) -> bool {
    if path.contains("..") {
        return false;
    }

    if let Some(after) = path.strip_prefix(DB_PREFIX) {
        let Some((name, rest)) = after.split_once('/') else {
            return false;
        };
        if !is_valid_database_name(name) {
            return false;
        }
        return matches_api_path(&clean_path(rest), api_path);
    }

    matches_api_path(&clean_path(path), api_path)
}

/// `path` starts with `api_path` and is followed by nothing, `/` or `?`.
fn matches_api_path(path: &str, api_path: &str) -> bool {
    match path.strip_prefix(api_path) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
        None => false,
    }
}

/// Lexically normalize a path: collapse empty and `.` segments, resolve `..`
/// against its parent, drop any trailing slash. Always returns an absolute path.
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut cleaned = String::with_capacity(path.len() + 1);
    for segment in &segments {
        cleaned.push('/');
        cleaned.push_str(segment);
    }
    if cleaned.is_empty() {
        cleaned.push('/');
    }
    cleaned
}

/// Percent-decode a raw request path.
///
/// Malformed escapes are kept literally; invalid UTF-8 is replaced.
pub fn decode_path(raw: &str) -> Cow<'_, str> {
    if !raw.contains('%') {
        return Cow::Borrowed(raw);
    }

    let decoded = urlencoding::decode_binary(raw.as_bytes());
    Cow::Owned(String::from_utf8_lossy(&decoded).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_endpoint_accepts() {
        for path in [
            "/_api/cursor",
            "/_api/cursor/12345",
            "/_db/mydb/_api/cursor",
            "/_db/mydb/_api/cursor/12345",
            "/_db/test_db/_api/cursor",
            "/_db/my-db/_api/cursor/999",
        ] {
            assert!(is_cursor_endpoint(path), "{path} should be a cursor endpoint");
        }
    }

    #[test]
    fn cursor_endpoint_rejects() {
        for path in [
            "/_api/cursor/",
            "/_api/cursor/abc",
            "/_api/cursor/12/",
            "/_api/cursor/12a",
            "/_api/cursorx",
            "/_api/document",
            "/_db/../_api/cursor",
            "/_db/my.db/_api/cursor",
            "/_db/my/db/_api/cursor",
            "/_db//_api/cursor",
            "/prefix/_api/cursor",
            "/_db/mydb",
        ] {
            assert!(!is_cursor_endpoint(path), "{path} should not be a cursor endpoint");
        }
    }

    #[test]
    fn api_prefix_direct_paths() {
        assert!(has_api_prefix("/_api/document/collection/key", "/_api/document"));
        assert!(has_api_prefix("/_api/document", "/_api/document"));
        assert!(has_api_prefix("/_api/document/x", "/_api/document"));
        assert!(has_api_prefix("/_api/collection", "/_api/collection"));
        assert!(has_api_prefix("/_api/index/collection/12345", "/_api/index"));
        assert!(has_api_prefix("/_api/import", "/_api/import"));
        assert!(has_api_prefix("/_api/index?collection=test", "/_api/index"));
    }

    #[test]
    fn api_prefix_database_paths() {
        assert!(has_api_prefix("/_db/mydb/_api/document/coll", "/_api/document"));
        assert!(has_api_prefix("/_db/test_db/_api/collection", "/_api/collection"));
        assert!(has_api_prefix("/_db/my-db/_api/index", "/_api/index"));
    }

    #[test]
    fn api_prefix_rejections() {
        for path in [
            "/_api/version",
            "/_api/documentx",
            "/_api/documents/x",
            "/_db/../_api/document",
            "/../_api/document",
            "/_api/document/../../_api/user",
            "/foo/_api/document",
            "/foo/_api/document/bar",
            "/_db/my.db/_api/document",
            "/_db/my/db/_api/document",
            "/_db//_api/document",
            "/_db//_api/_api/document",
            "/_db/mydb",
        ] {
            assert!(!has_api_prefix(path, "/_api/document"), "{path} should not match");
        }
    }

    #[test]
    fn api_prefix_rejects_any_double_dot() {
        for path in ["/_api/document/..", "/_api/document/a..b", "/_db/x/_api/document/../y"] {
            assert!(!has_api_prefix(path, "/_api/document"), "{path} should not match");
        }
    }

    #[test]
    fn invalid_database_characters() {
        for name in ["my.db", "my db", "db!", "d%62", "", "ü"] {
            assert!(!is_valid_database_name(name), "{name:?} should be invalid");
            let path = format!("/_db/{name}/_api/document");
            assert!(!has_api_prefix(&path, "/_api/document"), "{path} should not match");
            let path = format!("/_db/{name}/_api/cursor");
            assert!(!is_cursor_endpoint(&path), "{path} should not be a cursor endpoint");
        }
    }

    #[test]
    fn normalization_collapses_dots_and_slashes() {
        assert_eq!(clean_path("/_api//document/./x/"), "/_api/document/x");
        assert_eq!(clean_path("/a/b/../c"), "/a/c");
        assert_eq!(clean_path("/"), "/");
        assert_eq!(clean_path(""), "/");
        assert!(has_api_prefix("/./_api/document", "/_api/document"));
        assert!(has_api_prefix("/_db/mydb//_api/document/", "/_api/document"));
    }

    #[test]
    fn decode_path_handles_escapes() {
        assert_eq!(decode_path("/_api/version"), "/_api/version");
        assert_eq!(decode_path("/_api/%64ocument"), "/_api/document");
        assert_eq!(decode_path("/_api/document/%2e%2E/user"), "/_api/document/../user");
        assert_eq!(decode_path("/bad/%zz/%4"), "/bad/%zz/%4");
        assert_eq!(decode_path("/trailing%"), "/trailing%");
        assert_eq!(decode_path("/_api/cursor%2F%31"), "/_api/cursor/1");
        assert_eq!(decode_path("/_db/%ff/_api"), "/_db/\u{fffd}/_api");
    }

    #[test]
    fn encoded_traversal_is_rejected_after_decoding() {
        let decoded = decode_path("/_api/document/%2e%2e/user");
        assert!(!has_api_prefix(&decoded, "/_api/document"));
    }
}
