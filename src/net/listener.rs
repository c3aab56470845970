//! Unix socket listener with backpressure.
//!
//! # Responsibilities
//! - Prepare the socket path (parent directory, stale socket file)
//! - Bind and apply the configured permission bits
//! - Accept incoming connections
//! - Enforce max_connections limit via semaphore
//! - Remove the socket file on shutdown

use std::fs::{DirBuilder, Permissions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;

use crate::config::ListenerConfig;
use crate::error::{ProxyError, Result};

/// Mode for a socket directory created on demand.
const SOCKET_DIR_MODE: u32 = 0o750;

/// A bounded Unix socket listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections will wait until a slot becomes available.
#[derive(Debug)]
pub struct Listener {
    /// The underlying Unix listener.
    inner: UnixListener,
    /// Path of the socket file.
    path: PathBuf,
    /// Semaphore to limit concurrent connections.
    connection_limit: Arc<Semaphore>,
    /// Configured maximum connections.
    max_connections: usize,
}

impl Listener {
    /// Prepare the socket path, bind, and chmod.
    pub fn bind(config: &ListenerConfig) -> Result<Self> {
        let path = config.socket_path.clone();
        prepare_socket_path(&path)?;

        let inner = UnixListener::bind(&path).map_err(|source| ProxyError::Bind {
            path: path.clone(),
            source,
        })?;

        std::fs::set_permissions(&path, Permissions::from_mode(config.socket_mode)).map_err(
            |source| ProxyError::Permissions {
                path: path.clone(),
                source,
            },
        )?;

        tracing::info!(
            socket = %path.display(),
            mode = %format!("{:04o}", config.socket_mode),
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner,
            path,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// This will wait if the connection limit has been reached.
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> io::Result<(UnixStream, ConnectionPermit)> {
        // Acquire permit first (backpressure)
        let permit = Arc::clone(&self.connection_limit)
            .acquire_owned()
            .await
            .map_err(|_| io::Error::other("connection limit semaphore closed"))?;

        let (stream, _addr) = self.inner.accept().await?;

        tracing::debug!(
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, ConnectionPermit { _permit: permit }))
    }

    /// Path of the socket file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Stop listening and remove the socket file.
    pub fn close(self) {
        let Listener { inner, path, .. } = self;
        drop(inner);
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!(socket = %path.display(), "Socket file removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(socket = %path.display(), error = %e, "Failed to remove socket file")
            }
        }
    }
}

/// Create the socket's parent directory if needed and remove a stale socket.
fn prepare_socket_path(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        DirBuilder::new()
            .recursive(true)
            .mode(SOCKET_DIR_MODE)
            .create(dir)
            .map_err(|source| ProxyError::SocketDir {
                path: path.to_path_buf(),
                source,
            })?;
    }

    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(socket = %path.display(), "Removed stale socket file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ProxyError::StaleSocket {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
/// This ensures backpressure is maintained even if the connection handler panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(path: PathBuf, mode: u32) -> ListenerConfig {
        ListenerConfig {
            socket_path: path,
            socket_mode: mode,
            max_connections: 2,
        }
    }

    #[tokio::test]
    async fn bind_creates_directory_and_applies_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/run/proxy.sock");

        let listener = Listener::bind(&config(path.clone(), 0o600)).unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);

        let parent = std::fs::metadata(path.parent().unwrap()).unwrap();
        assert!(parent.is_dir());

        listener.close();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn stale_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.sock");
        std::fs::write(&path, b"stale").unwrap();

        let listener = Listener::bind(&config(path.clone(), 0o640)).unwrap();
        assert_eq!(listener.path(), path.as_path());
        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o640);
    }

    #[tokio::test]
    async fn permits_bound_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.sock");
        let listener = Listener::bind(&config(path.clone(), 0o600)).unwrap();
        assert_eq!(listener.max_connections(), 2);

        let _client = UnixStream::connect(&path).await.unwrap();
        let (_stream, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_permits(), 1);
        drop(permit);
        assert_eq!(listener.available_permits(), 2);
    }
}
