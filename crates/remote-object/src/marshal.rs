//! Marshalling context
//!
//! Remote references travel as a short tag followed by the reference's own
//! external form. The [`MarshalContext`] supplies what a reader needs to
//! turn that back into a live reference: the tag registry, the socket
//! factories known by descriptor, the remote interfaces known by name, and
//! an optional generic codec for references that report no tag.

use crate::proxy::InterfaceDescriptor;
use crate::reference::{RemoteRef, UnicastRef};
use crate::types::{RemoteError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use remote_transport::SocketFactories;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Tag of a client reference to a bare endpoint
pub const UNICAST_REF: &str = "UnicastRef";
/// Tag of a client reference to an endpoint with a client socket factory
pub const UNICAST_REF2: &str = "UnicastRef2";
/// Tag of a server reference to a bare endpoint
pub const UNICAST_SERVER_REF: &str = "UnicastServerRef";
/// Tag of a server reference to an endpoint with socket factories
pub const UNICAST_SERVER_REF2: &str = "UnicastServerRef2";

/// Write a u16-length-prefixed UTF-8 string
pub fn put_string<B: BufMut>(buf: &mut B, value: &str) -> Result<()> {
    let len = u16::try_from(value.len())
        .map_err(|_| RemoteError::InvalidData(format!("string too long: {} bytes", value.len())))?;
    buf.put_u16(len);
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// Read a u16-length-prefixed UTF-8 string
pub fn get_string<B: Buf>(buf: &mut B) -> Result<String> {
    if buf.remaining() < 2 {
        return Err(RemoteError::BufferUnderflow {
            needed: 2,
            have: buf.remaining(),
        });
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(RemoteError::BufferUnderflow {
            needed: len,
            have: buf.remaining(),
        });
    }
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec())
        .map_err(|e| RemoteError::InvalidData(format!("invalid UTF-8 string: {}", e)))
}

/// Reads the external form of one concrete reference type
pub type RefDecoder =
    Arc<dyn Fn(&MarshalContext, &mut Bytes) -> Result<Arc<dyn RemoteRef>> + Send + Sync>;

/// Serialization used for references that report no tag
pub trait GenericRefCodec: Send + Sync {
    fn write_ref(&self, reference: &dyn RemoteRef, ctx: &MarshalContext, buf: &mut BytesMut) -> Result<()>;
    fn read_ref(&self, ctx: &MarshalContext, buf: &mut Bytes) -> Result<Arc<dyn RemoteRef>>;
}

/// Tag → reference decoder mapping
#[derive(Clone, Default)]
pub struct RefRegistry {
    decoders: HashMap<String, RefDecoder>,
}

impl RefRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry knowing the four unicast tags. Every one of them decodes
    /// to a client reference: server-side dispatch state never travels.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for tag in [UNICAST_REF, UNICAST_REF2, UNICAST_SERVER_REF, UNICAST_SERVER_REF2] {
            registry.register(tag, |ctx, buf| {
                let reference: Arc<dyn RemoteRef> = Arc::new(UnicastRef::read_external(ctx, buf)?);
                Ok(reference)
            });
        }
        registry
    }

    /// Register (or replace) the decoder for `tag`
    pub fn register<F>(&mut self, tag: impl Into<String>, decoder: F)
    where
        F: Fn(&MarshalContext, &mut Bytes) -> Result<Arc<dyn RemoteRef>> + Send + Sync + 'static,
    {
        self.decoders.insert(tag.into(), Arc::new(decoder));
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    /// Decode a reference with the decoder registered for `tag`
    pub fn decode(&self, tag: &str, ctx: &MarshalContext, buf: &mut Bytes) -> Result<Arc<dyn RemoteRef>> {
        let decoder = self
            .decoders
            .get(tag)
            .ok_or_else(|| RemoteError::UnresolvableRef(tag.to_string()))?;
        decoder(ctx, buf)
    }
}

impl fmt::Debug for RefRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.decoders.keys().collect();
        tags.sort();
        f.debug_struct("RefRegistry").field("tags", &tags).finish()
    }
}

/// Everything a reader or writer of remote references needs
#[derive(Clone)]
pub struct MarshalContext {
    refs: RefRegistry,
    factories: Arc<SocketFactories>,
    interfaces: HashMap<String, &'static InterfaceDescriptor>,
    generic: Option<Arc<dyn GenericRefCodec>>,
}

impl MarshalContext {
    /// A context with the builtin tags over the given factories
    pub fn new(factories: Arc<SocketFactories>) -> Self {
        Self {
            refs: RefRegistry::builtin(),
            factories,
            interfaces: HashMap::new(),
            generic: None,
        }
    }

    pub fn with_registry(mut self, refs: RefRegistry) -> Self {
        self.refs = refs;
        self
    }

    pub fn with_generic_codec(mut self, codec: Arc<dyn GenericRefCodec>) -> Self {
        self.generic = Some(codec);
        self
    }

    /// Make `interface` (and everything it extends) resolvable by name
    pub fn with_interface(mut self, interface: &'static InterfaceDescriptor) -> Self {
        self.register_interface(interface);
        self
    }

    pub fn register_interface(&mut self, interface: &'static InterfaceDescriptor) {
        self.interfaces.insert(interface.name.to_string(), interface);
        for parent in interface.extends {
            self.register_interface(parent);
        }
    }

    pub fn refs(&self) -> &RefRegistry {
        &self.refs
    }

    pub fn refs_mut(&mut self) -> &mut RefRegistry {
        &mut self.refs
    }

    pub fn factories(&self) -> &Arc<SocketFactories> {
        &self.factories
    }

    pub fn generic_codec(&self) -> Option<&Arc<dyn GenericRefCodec>> {
        self.generic.as_ref()
    }

    pub fn interface(&self, name: &str) -> Option<&'static InterfaceDescriptor> {
        self.interfaces.get(name).copied()
    }
}

impl Default for MarshalContext {
    fn default() -> Self {
        Self::new(SocketFactories::global())
    }
}

impl fmt::Debug for MarshalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut interfaces: Vec<_> = self.interfaces.keys().collect();
        interfaces.sort();
        f.debug_struct("MarshalContext")
            .field("refs", &self.refs)
            .field("interfaces", &interfaces)
            .field("generic", &self.generic.is_some())
            .finish()
    }
}
