//! Interface descriptors, proxies and the invocation handler

mod descriptor;
mod handler;
mod method_hash;
#[allow(clippy::module_inception)]
mod proxy;

pub use descriptor::{
    InterfaceDescriptor, MethodDescriptor, REMOTE, REMOTE_FAULT, REMOTE_INTERFACE_NAME,
};
pub use handler::{InvocationHandler, ObjectMethod, ObjectValue};
pub use method_hash::{compute_method_hash, method_hash, MethodHashCache};
pub use proxy::Proxy;
