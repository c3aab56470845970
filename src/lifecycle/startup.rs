//! Startup orchestration.
//!
//! # Responsibilities
//! - Merge configuration sources and validate the result
//! - Initialize logging and the optional metrics exporter
//! - Bind the listening socket and begin accepting traffic
//! - Wait for a termination signal, then drain and clean up
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::path::PathBuf;

use crate::config::loader::{load_config, ConfigError};
use crate::config::validation::validate_config;
use crate::config::{AccessMode, ProxyConfig};
use crate::error::Result;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::net::Listener;
use crate::observability::{logging, metrics};

/// Settings given on the command line; they win over every other source.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub listen_socket: Option<PathBuf>,
    pub upstream_socket: Option<PathBuf>,
}

/// Build the final configuration for `mode`.
pub fn resolve_config(mode: AccessMode, overrides: &Overrides) -> Result<ProxyConfig> {
    let mut config = load_config(mode, overrides.config_file.as_deref())?;
    apply_overrides(&mut config, overrides)?;
    Ok(config)
}

/// Apply CLI overrides and validate again.
pub fn apply_overrides(
    config: &mut ProxyConfig,
    overrides: &Overrides,
) -> std::result::Result<(), ConfigError> {
    if let Some(path) = &overrides.listen_socket {
        config.listener.socket_path = path.clone();
    }
    if let Some(path) = &overrides.upstream_socket {
        config.upstream.socket_path = path.clone();
    }
    validate_config(config).map_err(ConfigError::Validation)
}

/// Run a proxy in `mode` until SIGINT or SIGTERM.
pub async fn run(mode: AccessMode, overrides: Overrides) -> Result<()> {
    let config = logging::with_startup_logging(|| resolve_config(mode, &overrides))?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %mode,
        listen = %config.listener.socket_path.display(),
        upstream = %config.upstream.socket_path.display(),
        client_timeout_secs = config.timeouts.client_secs,
        dial_timeout_secs = config.timeouts.dial_secs,
        "Configuration loaded"
    );

    if let Some(address) = &config.observability.metrics_address {
        metrics::init_metrics(address)?;
    }

    let shutdown = Shutdown::new();
    let listener = Listener::bind(&config.listener)?;
    let server = HttpServer::new(&config, mode);
    let signals = signals::spawn_signal_handler(shutdown.clone());

    server.run(listener, &shutdown).await;
    signals.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}
