//! Configuration loading.
//!
//! Sources are layered: mode defaults, then an optional TOML file, then the
//! process environment. Callers apply CLI flags last and re-validate.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::env::apply_env_overrides;
use crate::config::schema::{AccessMode, ListenerConfig, ProxyConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML document for the given mode.
///
/// Listener fields the document leaves out fall back to the mode's defaults
/// rather than the read-only ones `Default` would pick.
pub fn parse_config(mode: AccessMode, content: &str) -> Result<ProxyConfig, ConfigError> {
    let table: toml::Table = toml::from_str(content)?;
    let mut config: ProxyConfig = toml::from_str(content)?;

    let listener = table.get("listener").and_then(|v| v.as_table());
    let has = |key: &str| listener.is_some_and(|t| t.contains_key(key));
    let defaults = ListenerConfig::for_mode(mode);
    if !has("socket_path") {
        config.listener.socket_path = defaults.socket_path;
    }
    if !has("socket_mode") {
        config.listener.socket_mode = defaults.socket_mode;
    }

    Ok(config)
}

/// Load configuration for `mode`, reading `path` if given and applying
/// environment overrides from `lookup`. The result is validated.
pub fn load_config_with<F>(
    mode: AccessMode,
    path: Option<&Path>,
    lookup: F,
) -> Result<ProxyConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            parse_config(mode, &content)?
        }
        None => ProxyConfig::for_mode(mode),
    };

    apply_env_overrides(&mut config, lookup);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load configuration using the process environment.
pub fn load_config(mode: AccessMode, path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    load_config_with(mode, path, crate::config::env::process_env)
}
