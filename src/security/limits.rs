//! Request inspection limits.
//!
//! # Responsibilities
//! - Cap how much of a request body the proxy will ever buffer
//! - Size the peek used for AQL keyword scanning
//!
//! # Design Decisions
//! - Limits are process-wide constants, not configuration
//! - A body larger than the limit is rejected, never forwarded uninspected

/// Hard ceiling on bytes read from a request body for inspection (16 MiB).
pub const MAX_BODY_PEEK_SIZE: usize = 16 * 1024 * 1024;

/// Bytes of a cursor request body inspected for write keywords (128 KiB).
pub const CURSOR_PEEK_LIMIT: i64 = 128 * 1024;

/// Clamp a requested peek size to `(0, MAX_BODY_PEEK_SIZE]`.
///
/// Zero or negative means "use the ceiling".
pub fn effective_peek_limit(limit: i64) -> usize {
    match usize::try_from(limit) {
        Ok(n) if n > 0 && n <= MAX_BODY_PEEK_SIZE => n,
        _ => MAX_BODY_PEEK_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_limits() {
        assert_eq!(effective_peek_limit(1024), 1024);
        assert_eq!(effective_peek_limit(0), MAX_BODY_PEEK_SIZE);
        assert_eq!(effective_peek_limit(-5), MAX_BODY_PEEK_SIZE);
        assert_eq!(effective_peek_limit(i64::MAX), MAX_BODY_PEEK_SIZE);
        assert_eq!(effective_peek_limit(MAX_BODY_PEEK_SIZE as i64), MAX_BODY_PEEK_SIZE);
    }
}
