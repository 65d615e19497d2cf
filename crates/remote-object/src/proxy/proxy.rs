//! Client-side stand-ins for remote objects

use super::descriptor::{InterfaceDescriptor, MethodDescriptor};
use super::handler::InvocationHandler;
use crate::marshal::{get_string, put_string, MarshalContext};
use crate::object::{RemoteIdentity, RemoteObject};
use crate::reference::RemoteRef;
use crate::types::{Fault, RemoteError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A local object implementing a set of remote interfaces by routing every
/// call through its [`InvocationHandler`]
///
/// Typed adapters wrap a `Proxy` and call [`invoke`](Proxy::invoke) with a
/// static [`MethodDescriptor`] per method. Equality, hashing and the string
/// form are answered by the handler without a remote call.
#[derive(Clone)]
pub struct Proxy {
    interfaces: Arc<[&'static InterfaceDescriptor]>,
    handler: Arc<InvocationHandler>,
}

impl Proxy {
    /// Build a proxy over `interfaces`. The list must be non-empty and
    /// name each interface once.
    pub fn new(
        interfaces: &[&'static InterfaceDescriptor],
        handler: Arc<InvocationHandler>,
    ) -> Result<Self> {
        if interfaces.is_empty() {
            return Err(RemoteError::Usage("proxy needs at least one interface".to_string()));
        }
        for (i, interface) in interfaces.iter().enumerate() {
            if interfaces[..i].iter().any(|earlier| earlier.name == interface.name) {
                return Err(RemoteError::Usage(format!(
                    "repeated interface: {}",
                    interface.name
                )));
            }
        }
        Ok(Self {
            interfaces: interfaces.into(),
            handler,
        })
    }

    /// Build a proxy with a fresh handler around `reference`
    pub fn with_ref(
        interfaces: &[&'static InterfaceDescriptor],
        reference: Arc<dyn RemoteRef>,
    ) -> Result<Self> {
        Self::new(interfaces, Arc::new(InvocationHandler::new(reference)))
    }

    pub fn interfaces(&self) -> &[&'static InterfaceDescriptor] {
        &self.interfaces
    }

    pub fn handler(&self) -> &Arc<InvocationHandler> {
        &self.handler
    }

    pub fn reference(&self) -> &Arc<dyn RemoteRef> {
        self.handler.reference()
    }

    /// Whether the proxy implements `name`, directly or by extension
    pub fn implements(&self, name: &str) -> bool {
        self.interfaces.iter().any(|i| i.is_or_extends(name))
    }

    /// Call `method` remotely with the marshalled `args`
    pub async fn invoke(&self, method: &'static MethodDescriptor, args: Bytes) -> Result<Bytes> {
        self.handler.invoke(self, method, args).await
    }

    /// Whether `method` is declared on a remote-capable interface this
    /// proxy implements
    pub fn declares_remote_method(&self, method: &MethodDescriptor) -> bool {
        self.interfaces
            .iter()
            .filter_map(|i| i.find_interface(method.interface))
            .any(|declaring| {
                declaring.is_remote() && declaring.methods.iter().any(|m| m.same_signature(method))
            })
    }

    /// Whether `fault` is declared by `method` as this proxy exposes it.
    /// When several interfaces declare the same method, each of them must
    /// declare the fault.
    pub fn method_declares(&self, method: &'static MethodDescriptor, fault: &Fault) -> bool {
        let mut resolved = self
            .interfaces
            .iter()
            .flat_map(|i| i.all_methods())
            .filter(|m| m.same_signature(method))
            .peekable();
        if resolved.peek().is_none() {
            return method.declares(fault);
        }
        resolved.all(|m| m.declares(fault))
    }

    /// Interface named in the string form: the first one, unless that is
    /// the remote marker and a more specific one follows
    pub(crate) fn display_interface(&self) -> &'static InterfaceDescriptor {
        match self.interfaces.as_ref() {
            [first, second, ..] if first.is_marker() => *second,
            [first, ..] => *first,
            [] => &super::descriptor::REMOTE,
        }
    }

    /// Write the interface names, then the handler's reference
    pub fn encode(&self, ctx: &MarshalContext, buf: &mut BytesMut) -> Result<()> {
        buf.put_u16(self.interfaces.len() as u16);
        for interface in self.interfaces.iter() {
            put_string(buf, interface.name)?;
        }
        self.handler.encode(ctx, buf)
    }

    /// Read a proxy; its interfaces must be known to `ctx`
    pub fn decode(ctx: &MarshalContext, buf: &mut Bytes) -> Result<Self> {
        if buf.remaining() < 2 {
            return Err(RemoteError::BufferUnderflow {
                needed: 2,
                have: buf.remaining(),
            });
        }
        let count = buf.get_u16() as usize;
        let mut interfaces = Vec::with_capacity(count);
        for _ in 0..count {
            let name = get_string(buf)?;
            let interface = ctx
                .interface(&name)
                .ok_or(RemoteError::UnresolvableRef(name))?;
            interfaces.push(interface);
        }
        let handler = InvocationHandler::decode(ctx, buf)?;
        Self::new(&interfaces, Arc::new(handler))
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.handler.proxy_equals(self, other)
    }
}

impl Eq for Proxy {}

impl Hash for Proxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.handler.hash_code());
    }
}

impl RemoteIdentity for Proxy {
    fn identity_equals(&self, object: &RemoteObject) -> bool {
        self.handler.remote_object() == object
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("interfaces", &self.interfaces)
            .field("handler", &self.handler)
            .finish()
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.handler.proxy_to_string(self))
    }
}
