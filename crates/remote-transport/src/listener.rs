//! Listening endpoint and accept loop
//!
//! # Scalability Features
//!
//! - Each connection handled in a separate Tokio task
//! - Semaphore-based connection limiting
//! - Accept failures consult the installed failure handler and back off
//!   before retrying instead of spinning

use crate::error::{Result, TransportError};
use crate::frame::DEFAULT_MAX_FRAME_SIZE;
use crate::socket_factory::{ServerSocketFactory, SocketFactories};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Serves one accepted connection until it closes
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) -> Result<()>;
}

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub max_frame_size: usize,
    pub max_connections: usize,
    /// Pause before accepting again after a failed accept
    pub accept_retry_delay: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_connections: 10000,
            accept_retry_delay: Duration::from_millis(10),
        }
    }
}

/// Listener statistics
#[derive(Debug, Default)]
pub struct ListenerStats {
    pub connections_accepted: AtomicU64,
    pub connections_active: AtomicU64,
    pub connections_rejected: AtomicU64,
    pub accept_failures: AtomicU64,
}

impl ListenerStats {
    pub fn snapshot(&self) -> ListenerStatsSnapshot {
        ListenerStatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            accept_failures: self.accept_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of listener statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerStatsSnapshot {
    pub connections_accepted: u64,
    pub connections_active: u64,
    pub connections_rejected: u64,
    pub accept_failures: u64,
}

/// Create a listening socket through `factory`.
///
/// A single attempt is made. On failure the error carries the port so the
/// caller can decide, together with the failure handler, whether to retry.
pub async fn listen(factory: &dyn ServerSocketFactory, port: u16) -> Result<TcpListener> {
    factory
        .create_server_socket(port)
        .await
        .map_err(|source| TransportError::ListenFailed { port, source })
}

/// A running accept loop
pub struct ListenerHandle {
    local_addr: SocketAddr,
    stats: Arc<ListenerStats>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn stats(&self) -> &Arc<ListenerStats> {
        &self.stats
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop accepting; connections already being served keep running
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn the accept loop for `listener`, handing each connection to `handler`
pub fn spawn_accept_loop(
    listener: TcpListener,
    config: ListenerConfig,
    factories: Arc<SocketFactories>,
    handler: Arc<dyn ConnectionHandler>,
) -> Result<ListenerHandle> {
    let local_addr = listener.local_addr()?;
    let stats = Arc::new(ListenerStats::default());
    info!(
        "Remote object listener on {} (max_connections: {})",
        local_addr, config.max_connections
    );

    let task = tokio::spawn(accept_loop(
        listener,
        config,
        factories,
        handler,
        Arc::clone(&stats),
    ));

    Ok(ListenerHandle {
        local_addr,
        stats,
        task,
    })
}

async fn accept_loop(
    listener: TcpListener,
    config: ListenerConfig,
    factories: Arc<SocketFactories>,
    handler: Arc<dyn ConnectionHandler>,
    stats: Arc<ListenerStats>,
) {
    let semaphore = Arc::new(Semaphore::new(config.max_connections));

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                stats.accept_failures.fetch_add(1, Ordering::Relaxed);
                if factories.should_retry(&e) {
                    warn!("Accept failed, retrying: {}", e);
                    tokio::time::sleep(config.accept_retry_delay).await;
                    continue;
                }
                warn!("Accept failed, closing listener: {}", e);
                return;
            }
        };

        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                stats.connections_rejected.fetch_add(1, Ordering::Relaxed);
                warn!("Connection limit reached, rejecting connection from {}", peer_addr);
                drop(stream);
                continue;
            }
        };

        stats.connections_accepted.fetch_add(1, Ordering::Relaxed);
        stats.connections_active.fetch_add(1, Ordering::Relaxed);
        debug!("Accepted connection from {}", peer_addr);

        let handler = Arc::clone(&handler);
        let stats = Arc::clone(&stats);
        tokio::spawn(async move {
            let _permit = permit;
            let result = handler.handle_connection(stream, peer_addr).await;
            stats.connections_active.fetch_sub(1, Ordering::Relaxed);

            match result {
                Ok(()) | Err(TransportError::ConnectionClosed) => {
                    debug!("Connection closed from {}", peer_addr)
                }
                Err(e) => warn!("Connection error from {}: {}", peer_addr, e),
            }
        });
    }
}
