//! Pluggable socket factories
//!
//! Client sockets and listening sockets are created through factories so
//! deployments can substitute their own (tunnelling, TLS, fixed interfaces).
//! Factories are compared by their descriptor: two factories that would
//! behave identically must report the same descriptor.

use crate::error::{Result, TransportError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use std::sync::{Arc, LazyLock, OnceLock};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

/// Descriptor of the built-in direct factory
pub const DIRECT_FACTORY: &str = "direct";

/// Functional identity shared by client and server factories
pub trait FactoryIdentity: Send + Sync + fmt::Debug {
    /// Stable name describing what this factory does; equal descriptors
    /// mean interchangeable factories.
    fn descriptor(&self) -> &str;
}

/// Creates outgoing connections
#[async_trait]
pub trait ClientSocketFactory: FactoryIdentity {
    async fn create_socket(&self, host: &str, port: u16) -> io::Result<TcpStream>;
}

/// Creates listening sockets
#[async_trait]
pub trait ServerSocketFactory: FactoryIdentity {
    async fn create_server_socket(&self, port: u16) -> io::Result<TcpListener>;
}

/// A factory for both sides of a connection
pub trait SocketFactory: ClientSocketFactory + ServerSocketFactory {}

impl<T: ClientSocketFactory + ServerSocketFactory> SocketFactory for T {}

/// Compare two optional client factories by functional equivalence
pub fn same_client_factory(
    a: Option<&Arc<dyn ClientSocketFactory>>,
    b: Option<&Arc<dyn ClientSocketFactory>>,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.descriptor() == b.descriptor(),
        _ => false,
    }
}

/// Compare two optional server factories by functional equivalence
pub fn same_server_factory(
    a: Option<&Arc<dyn ServerSocketFactory>>,
    b: Option<&Arc<dyn ServerSocketFactory>>,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.descriptor() == b.descriptor(),
        _ => false,
    }
}

/// Direct, unencrypted sockets bound on the OS default interfaces
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DirectSocketFactory;

impl FactoryIdentity for DirectSocketFactory {
    fn descriptor(&self) -> &str {
        DIRECT_FACTORY
    }
}

#[async_trait]
impl ClientSocketFactory for DirectSocketFactory {
    async fn create_socket(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

#[async_trait]
impl ServerSocketFactory for DirectSocketFactory {
    async fn create_server_socket(&self, port: u16) -> io::Result<TcpListener> {
        TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await
    }
}

/// Decides whether listening-socket creation should be retried
pub trait FailureHandler: Send + Sync {
    /// Return `true` to retry, `false` to give up
    fn failure(&self, error: &io::Error) -> bool;
}

impl<F> FailureHandler for F
where
    F: Fn(&io::Error) -> bool + Send + Sync,
{
    fn failure(&self, error: &io::Error) -> bool {
        self(error)
    }
}

/// Process-wide socket factory state
///
/// Holds the installed socket factory and failure handler (each assignable
/// at most once), the direct default factory, and the client factories
/// known by descriptor so references carrying them can be decoded.
pub struct SocketFactories {
    installed: OnceLock<Arc<dyn SocketFactory>>,
    failure_handler: OnceLock<Arc<dyn FailureHandler>>,
    default_factory: Arc<DirectSocketFactory>,
    client_factories: RwLock<HashMap<String, Arc<dyn ClientSocketFactory>>>,
}

static GLOBAL: LazyLock<Arc<SocketFactories>> = LazyLock::new(|| Arc::new(SocketFactories::new()));

impl SocketFactories {
    /// Create a fresh factory state with nothing installed
    pub fn new() -> Self {
        let default_factory = Arc::new(DirectSocketFactory);
        let mut client_factories: HashMap<String, Arc<dyn ClientSocketFactory>> = HashMap::new();
        client_factories.insert(DIRECT_FACTORY.to_string(), default_factory.clone());
        Self {
            installed: OnceLock::new(),
            failure_handler: OnceLock::new(),
            default_factory,
            client_factories: RwLock::new(client_factories),
        }
    }

    /// The process-wide instance
    pub fn global() -> Arc<SocketFactories> {
        GLOBAL.clone()
    }

    /// Install the socket factory; fails if one is already installed
    pub fn set_socket_factory(&self, factory: Arc<dyn SocketFactory>) -> Result<()> {
        let client: Arc<dyn ClientSocketFactory> = factory.clone();
        self.installed
            .set(factory)
            .map_err(|_| TransportError::AlreadyDefined("socket factory"))?;
        debug!("Installed socket factory: {}", client.descriptor());
        self.register_client_factory(client);
        Ok(())
    }

    /// The installed socket factory, if any
    pub fn socket_factory(&self) -> Option<Arc<dyn SocketFactory>> {
        self.installed.get().cloned()
    }

    /// The direct factory used when nothing is installed
    pub fn default_socket_factory(&self) -> Arc<dyn SocketFactory> {
        self.default_factory.clone()
    }

    /// The installed factory, or the default
    pub fn effective(&self) -> Arc<dyn SocketFactory> {
        self.socket_factory()
            .unwrap_or_else(|| self.default_socket_factory())
    }

    /// Install the failure handler; fails if one is already installed
    pub fn set_failure_handler(&self, handler: Arc<dyn FailureHandler>) -> Result<()> {
        self.failure_handler
            .set(handler)
            .map_err(|_| TransportError::AlreadyDefined("failure handler"))
    }

    /// The installed failure handler, if any
    pub fn failure_handler(&self) -> Option<Arc<dyn FailureHandler>> {
        self.failure_handler.get().cloned()
    }

    /// Whether a failed listening-socket creation should be retried.
    /// Without a handler the answer is always yes.
    pub fn should_retry(&self, error: &io::Error) -> bool {
        match self.failure_handler.get() {
            Some(handler) => handler.failure(error),
            None => true,
        }
    }

    /// Make a client factory resolvable by its descriptor
    pub fn register_client_factory(&self, factory: Arc<dyn ClientSocketFactory>) {
        let mut factories = self.client_factories.write();
        factories.insert(factory.descriptor().to_string(), factory);
    }

    /// Look up a client factory by descriptor
    pub fn resolve_client_factory(&self, descriptor: &str) -> Option<Arc<dyn ClientSocketFactory>> {
        let factories = self.client_factories.read();
        factories.get(descriptor).cloned()
    }
}

impl Default for SocketFactories {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SocketFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketFactories")
            .field("installed", &self.installed.get().map(|s| s.descriptor().to_string()))
            .field("failure_handler", &self.failure_handler.get().is_some())
            .finish()
    }
}
