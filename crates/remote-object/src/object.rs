//! Remote object identity
//!
//! [`RemoteObject`] is the identity shared by implementations and proxies:
//! equality, hashing and the string form all delegate to the wrapped
//! [`RemoteRef`], so a proxy and the object it stands for agree. It also
//! owns the marshalled form of the reference (tag, then external form).

use crate::marshal::{get_string, put_string, MarshalContext};
use crate::proxy::{InterfaceDescriptor, MethodDescriptor};
use crate::reference::RemoteRef;
use crate::types::{RemoteError, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;
use remote_transport::{ClientSocketFactory, ServerSocketFactory};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

/// Parameters an object was exported with, kept so it can be exported
/// again after cloning or reconstruction.
#[derive(Clone, Debug, Default)]
pub struct ExportParams {
    /// Requested port; 0 for any free port
    pub port: u16,
    pub csf: Option<Arc<dyn ClientSocketFactory>>,
    pub ssf: Option<Arc<dyn ServerSocketFactory>>,
}

impl ExportParams {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            csf: None,
            ssf: None,
        }
    }

    pub fn with_client_factory(mut self, csf: Arc<dyn ClientSocketFactory>) -> Self {
        self.csf = Some(csf);
        self
    }

    pub fn with_server_factory(mut self, ssf: Arc<dyn ServerSocketFactory>) -> Self {
        self.ssf = Some(ssf);
        self
    }
}

/// A server-side implementation that can be exported
#[async_trait]
pub trait RemoteImpl: Send + Sync + 'static {
    /// Name used in diagnostics
    fn type_name(&self) -> &'static str;

    /// Interfaces this implementation provides; only the remote-capable
    /// ones are exposed.
    fn interfaces(&self) -> &'static [&'static InterfaceDescriptor];

    /// Execute `method` with the marshalled `args`. Method failures are
    /// returned as [`RemoteError::Application`].
    async fn dispatch(&self, method: &'static MethodDescriptor, args: Bytes) -> Result<Bytes>;

    /// The identity this implementation carries, if it embeds one. The
    /// exporter attaches the server reference to it.
    fn remote_object(&self) -> Option<&RemoteObject> {
        None
    }
}

/// Types that are not remote objects themselves but define equality with one
pub trait RemoteIdentity {
    fn identity_equals(&self, object: &RemoteObject) -> bool;
}

/// Identity carried by remote implementations and proxies
pub struct RemoteObject {
    type_name: &'static str,
    identity: u64,
    reference: RwLock<Option<Arc<dyn RemoteRef>>>,
    export_params: RwLock<Option<ExportParams>>,
}

impl RemoteObject {
    /// An object with no reference yet
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            identity: NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed),
            reference: RwLock::new(None),
            export_params: RwLock::new(None),
        }
    }

    pub fn with_ref(type_name: &'static str, reference: Arc<dyn RemoteRef>) -> Self {
        let object = Self::new(type_name);
        *object.reference.write() = Some(reference);
        object
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn reference(&self) -> Option<Arc<dyn RemoteRef>> {
        self.reference.read().clone()
    }

    pub fn has_reference(&self) -> bool {
        self.reference.read().is_some()
    }

    pub(crate) fn set_reference(&self, reference: Option<Arc<dyn RemoteRef>>) {
        *self.reference.write() = reference;
    }

    pub fn export_params(&self) -> Option<ExportParams> {
        self.export_params.read().clone()
    }

    pub(crate) fn set_export_params(&self, params: ExportParams) {
        *self.export_params.write() = Some(params);
    }

    /// Hash of the reference, or an identity hash when there is none
    pub fn hash_code(&self) -> i32 {
        match self.reference.read().as_ref() {
            Some(reference) => reference.remote_hash_code(),
            None => (self.identity ^ (self.identity >> 32)) as i32,
        }
    }

    /// Equality against a non-remote type, delegated to that type
    pub fn equals_foreign(&self, other: &dyn RemoteIdentity) -> bool {
        other.identity_equals(self)
    }

    /// Write the reference's tag, then its external form. A reference
    /// with no tag is written by the context's generic codec after an
    /// empty tag.
    pub fn encode(&self, ctx: &MarshalContext, buf: &mut BytesMut) -> Result<()> {
        let reference = self.reference().ok_or_else(|| {
            RemoteError::InvalidRemoteObject(format!("{}: no reference to marshal", self.type_name))
        })?;
        write_ref(reference.as_ref(), ctx, buf)
    }

    /// Read back an object written by [`encode`](Self::encode)
    pub fn decode(type_name: &'static str, ctx: &MarshalContext, buf: &mut Bytes) -> Result<Self> {
        let reference = read_ref(ctx, buf)?;
        Ok(Self::with_ref(type_name, reference))
    }
}

/// Write `reference` under its tag
pub fn write_ref(reference: &dyn RemoteRef, ctx: &MarshalContext, buf: &mut BytesMut) -> Result<()> {
    match reference.ref_class(ctx) {
        Some(tag) => {
            put_string(buf, tag)?;
            reference.write_external(ctx, buf)
        }
        None => {
            let codec = ctx.generic_codec().ok_or_else(|| {
                RemoteError::InvalidRemoteObject(format!(
                    "{} has no tag and no generic codec is configured",
                    reference.remote_to_string()
                ))
            })?;
            put_string(buf, "")?;
            codec.write_ref(reference, ctx, buf)
        }
    }
}

/// Read a reference written by [`write_ref`]
pub fn read_ref(ctx: &MarshalContext, buf: &mut Bytes) -> Result<Arc<dyn RemoteRef>> {
    let tag = get_string(buf)?;
    if tag.is_empty() {
        let codec = ctx
            .generic_codec()
            .ok_or_else(|| RemoteError::UnresolvableRef("<generic>".to_string()))?;
        return codec.read_ref(ctx, buf);
    }
    ctx.refs().decode(&tag, ctx, buf)
}

impl Clone for RemoteObject {
    /// A clone is a distinct object: it keeps the export parameters but
    /// not the reference, and must be exported on its own.
    fn clone(&self) -> Self {
        let clone = Self::new(self.type_name);
        *clone.export_params.write() = self.export_params();
        clone
    }
}

impl PartialEq for RemoteObject {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        match (self.reference(), other.reference()) {
            (Some(a), Some(b)) => a.remote_equals(b.as_ref()),
            _ => false,
        }
    }
}

impl Eq for RemoteObject {}

impl Hash for RemoteObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.hash_code());
    }
}

impl fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteObject")
            .field("type_name", &self.type_name)
            .field("identity", &self.identity)
            .field("reference", &self.reference.read())
            .finish()
    }
}

impl fmt::Display for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reference.read().as_ref() {
            Some(reference) => write!(f, "{}[{}]", self.type_name, reference.remote_to_string()),
            None => f.write_str(self.type_name),
        }
    }
}
