//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Honor `RUST_LOG`, falling back to the configured level
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Human-readable fmt output on stderr; the socket is the product, not stdout

use tracing::Subscriber;
use tracing_subscriber::{
    fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Level used while configuration is still being loaded.
pub const STARTUP_LEVEL: &str = "info";

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(level: &str) -> String {
    format!("arango_socket_proxy={level},tower_http={level},warn")
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level).into())
}

fn subscriber<W>(filter: EnvFilter, writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(level: &str) {
    let _ = subscriber(env_filter(level), std::io::stderr).try_init();
}

/// Run `f` under a temporary stderr subscriber, so events raised before
/// [`init_logging`] (bad environment overrides, for one) are not lost.
pub fn with_startup_logging<T>(f: impl FnOnce() -> T) -> T {
    let startup = subscriber(env_filter(STARTUP_LEVEL), std::io::stderr);
    tracing::subscriber::with_default(startup, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::{apply_env_overrides, PROXY_DIAL_TIMEOUT_SECONDS};
    use crate::config::ProxyConfig;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[test]
    fn default_filter_scopes_to_crate() {
        let filter = default_filter("debug");
        assert!(filter.starts_with("arango_socket_proxy=debug"));
        assert!(filter.parse::<EnvFilter>().is_ok());
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn env_override_warnings_reach_the_startup_subscriber() {
        let captured = Captured::default();
        let writer = captured.clone();
        let startup = subscriber(
            EnvFilter::new(default_filter(STARTUP_LEVEL)),
            move || writer.clone(),
        );

        let mut config = ProxyConfig::default();
        tracing::subscriber::with_default(startup, || {
            apply_env_overrides(&mut config, |key| {
                (key == PROXY_DIAL_TIMEOUT_SECONDS).then(|| "10x".to_string())
            });
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Ignoring invalid timeout override"), "{output}");
        assert!(output.contains(PROXY_DIAL_TIMEOUT_SECONDS), "{output}");
        assert_eq!(config.timeouts.dial_secs, 10);
    }

    #[test]
    fn startup_logging_returns_the_result() {
        assert_eq!(with_startup_logging(|| 7), 7);
    }

    #[test]
    fn init_twice_is_fine() {
        init_logging("info");
        init_logging("debug");
    }
}
