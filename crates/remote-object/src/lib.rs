//! Remote object identity, invocation and export
//!
//! This crate lets a caller invoke methods on an object living in another
//! process through a local [`Proxy`]:
//!
//! - [`AddressSpaceId`] and [`ObjectId`]: unique and well-known identifiers
//! - [`RemoteRef`]: how to reach one remote object, with the unicast
//!   family ([`UnicastRef`], [`UnicastServerRef`]) over `remote-transport`
//! - [`RemoteObject`]: identity shared by implementations and proxies
//! - [`InvocationHandler`] and [`Proxy`]: local identity methods, method
//!   hashing, forwarding and fault re-wrapping
//! - [`Exporter`]: export/unexport lifecycle and server-side dispatch
//!
//! # Example
//!
//! ```no_run
//! use bytes::{Buf, Bytes};
//! use remote_object::{
//!     Exporter, InterfaceDescriptor, MethodDescriptor, RemoteError, RemoteImpl, REMOTE,
//! };
//! use std::sync::Arc;
//!
//! static PING: MethodDescriptor = MethodDescriptor::new("demo.Pinger", "ping", "()V", &[]);
//! static PINGER: InterfaceDescriptor =
//!     InterfaceDescriptor::new("demo.Pinger", &[&REMOTE], &[&PING]);
//! static PINGER_INTERFACES: [&InterfaceDescriptor; 1] = [&PINGER];
//!
//! struct Pinger;
//!
//! #[async_trait::async_trait]
//! impl RemoteImpl for Pinger {
//!     fn type_name(&self) -> &'static str {
//!         "Pinger"
//!     }
//!
//!     fn interfaces(&self) -> &'static [&'static InterfaceDescriptor] {
//!         &PINGER_INTERFACES
//!     }
//!
//!     async fn dispatch(
//!         &self,
//!         _method: &'static MethodDescriptor,
//!         _args: Bytes,
//!     ) -> Result<Bytes, RemoteError> {
//!         Ok(Bytes::new())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), RemoteError> {
//!     let exporter = Exporter::global();
//!     let proxy = exporter.export(Arc::new(Pinger), 0).await?;
//!     proxy.invoke(&PING, Bytes::new()).await?;
//!     println!("called {}", proxy);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod exporter;
pub mod marshal;
pub mod object;
pub mod proxy;
pub mod reference;
pub mod types;

pub use config::RuntimeConfig;
pub use exporter::{CallDispatcher, Exporter};
pub use marshal::{GenericRefCodec, MarshalContext, RefRegistry};
pub use object::{ExportParams, RemoteIdentity, RemoteImpl, RemoteObject};
pub use proxy::{
    compute_method_hash, method_hash, InterfaceDescriptor, InvocationHandler, MethodDescriptor, MethodHashCache,
    ObjectMethod, ObjectValue, Proxy, REMOTE, REMOTE_FAULT,
};
pub use reference::{Endpoint, LiveRef, RemoteRef, UnicastRef, UnicastServerRef};
pub use types::{AddressSpaceId, Fault, ObjectId, RemoteError, Result};
