//! ArangoDB Unix socket proxy.
//!
//! Sits between local clients and ArangoDB's Unix socket and filters requests
//! by privilege level. One process serves one socket: run it once in
//! `read-only` mode and once in `read-write` mode, and let filesystem
//! permissions decide who may connect to which.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client (Unix socket)
//!         │
//!         ▼
//!     ┌─────────┐    ┌─────────┐    ┌──────────────┐    ┌──────────┐
//!     │   net   │───▶│  http   │───▶│   security   │───▶│   net    │───▶ ArangoDB
//!     │listener │    │ server  │    │ access policy│    │ upstream │     socket
//!     └─────────┘    └─────────┘    └──────────────┘    └──────────┘
//!                         │  403 on deny / failed inspection
//!                         ▼
//!                      Client
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use arango_socket_proxy::config::AccessMode;
use arango_socket_proxy::lifecycle::startup::{self, Overrides};
use arango_socket_proxy::observability::logging;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Reads and read-only AQL queries
    ReadOnly,
    /// Reads plus document, collection, index and import writes
    ReadWrite,
}

impl From<ModeArg> for AccessMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::ReadOnly => AccessMode::ReadOnly,
            ModeArg::ReadWrite => AccessMode::ReadWrite,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "arango-socket-proxy", version, about = "Security-filtering proxy for ArangoDB's Unix socket")]
struct Cli {
    /// Access level served by this instance
    #[arg(value_enum)]
    mode: ModeArg,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listening socket path (overrides config and LISTEN_SOCKET)
    #[arg(long, value_name = "PATH")]
    listen: Option<PathBuf>,

    /// ArangoDB socket path (overrides config and UPSTREAM_SOCKET)
    #[arg(long, value_name = "PATH")]
    upstream: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let overrides = Overrides {
        config_file: cli.config,
        listen_socket: cli.listen,
        upstream_socket: cli.upstream,
    };

    if let Err(e) = startup::run(cli.mode.into(), overrides).await {
        // Logging may not be up yet if configuration failed.
        logging::init_logging("info");
        tracing::error!(error = %e, "Proxy failed");
        std::process::exit(1);
    }
}
