//! Transport layer for remote object invocation
//!
//! This crate provides the byte-level plumbing the remote object layer
//! consumes through narrow interfaces:
//!
//! - Self-delimiting frames over any `AsyncRead`/`AsyncWrite`
//! - Pluggable client and server socket factories, with a process-wide
//!   factory and failure handler that can each be installed once
//! - A listening endpoint with a connection-limited accept loop
//!
//! # Example
//!
//! ```no_run
//! use remote_transport::{listen, DirectSocketFactory};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = listen(&DirectSocketFactory, 0).await.unwrap();
//!     println!("listening on {}", listener.local_addr().unwrap());
//! }
//! ```

pub mod error;
pub mod frame;
pub mod listener;
pub mod socket_factory;

pub use error::{Result, TransportError};
pub use frame::{
    Frame, FrameHeader, FrameKind, FrameTransport, DEFAULT_MAX_FRAME_SIZE, FRAME_MAGIC,
    PROTOCOL_VERSION,
};
pub use listener::{
    listen, spawn_accept_loop, ConnectionHandler, ListenerConfig, ListenerHandle, ListenerStats,
    ListenerStatsSnapshot,
};
pub use socket_factory::{
    same_client_factory, same_server_factory, ClientSocketFactory, DirectSocketFactory,
    FactoryIdentity, FailureHandler, ServerSocketFactory, SocketFactories, SocketFactory,
    DIRECT_FACTORY,
};
