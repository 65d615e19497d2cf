//! Proxy invocation handler
//!
//! Every call made on a [`Proxy`] lands here. Identity methods (hash,
//! equality, string form) and finalization are answered locally; remote
//! methods are checked, hashed and forwarded to the reference. Checked
//! faults the proxy's interfaces do not declare are wrapped in
//! [`RemoteError::UnexpectedFault`].

use super::descriptor::MethodDescriptor;
use super::method_hash::MethodHashCache;
use super::proxy::Proxy;
use crate::marshal::MarshalContext;
use crate::object::{read_ref, RemoteObject};
use crate::reference::RemoteRef;
use crate::types::{RemoteError, Result};
use bytes::{Buf, Bytes, BytesMut};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

const HANDLER_TYPE_NAME: &str = "InvocationHandler";

/// Methods every object answers without a remote call
#[derive(Debug, Clone, Copy)]
pub enum ObjectMethod<'a> {
    HashCode,
    Equals(&'a Proxy),
    ToString,
    Finalize,
}

/// Result of an [`ObjectMethod`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectValue {
    Int(i32),
    Bool(bool),
    Text(String),
    Unit,
}

/// Routes proxy calls to a remote reference
pub struct InvocationHandler {
    object: RemoteObject,
    reference: Arc<dyn RemoteRef>,
    hashes: &'static MethodHashCache,
}

impl InvocationHandler {
    pub fn new(reference: Arc<dyn RemoteRef>) -> Self {
        Self::with_cache(reference, MethodHashCache::global())
    }

    pub fn with_cache(reference: Arc<dyn RemoteRef>, hashes: &'static MethodHashCache) -> Self {
        Self {
            object: RemoteObject::with_ref(HANDLER_TYPE_NAME, reference.clone()),
            reference,
            hashes,
        }
    }

    pub fn reference(&self) -> &Arc<dyn RemoteRef> {
        &self.reference
    }

    pub fn remote_object(&self) -> &RemoteObject {
        &self.object
    }

    fn check_proxy(&self, proxy: &Proxy) -> Result<()> {
        if std::ptr::eq(proxy.handler().as_ref(), self) {
            Ok(())
        } else {
            Err(RemoteError::Usage(
                "proxy is not backed by this invocation handler".to_string(),
            ))
        }
    }

    /// Handle a call made on `proxy`
    pub async fn invoke(
        &self,
        proxy: &Proxy,
        method: &'static MethodDescriptor,
        args: Bytes,
    ) -> Result<Bytes> {
        self.check_proxy(proxy)?;

        if method.is_finalizer() {
            trace!("Ignoring {:?} on proxy", method);
            return Ok(Bytes::new());
        }

        if !proxy.interfaces().iter().any(|i| i.is_remote()) {
            return Err(RemoteError::Usage(format!(
                "proxy does not implement a remote interface: {}",
                proxy
            )));
        }
        if !proxy.declares_remote_method(method) {
            return Err(RemoteError::Usage(format!(
                "method is not part of a remote interface: {:?}",
                method
            )));
        }

        let hash = self.hashes.hash(method);
        match self.reference.invoke(proxy, method, args, hash).await {
            Ok(result) => Ok(result),
            Err(e) => Err(self.rewrap(proxy, method, e)),
        }
    }

    /// Checked faults not declared by the method as the proxy exposes it
    /// become [`RemoteError::UnexpectedFault`]; everything else is unchanged.
    fn rewrap(&self, proxy: &Proxy, method: &'static MethodDescriptor, error: RemoteError) -> RemoteError {
        match error {
            RemoteError::Application(fault) if fault.is_checked() => {
                if proxy.method_declares(method, &fault) {
                    RemoteError::Application(fault)
                } else {
                    debug!("Undeclared fault from {:?}: {}", method, fault);
                    RemoteError::UnexpectedFault(Box::new(fault))
                }
            }
            other => other,
        }
    }

    /// Answer an identity method for `proxy` locally
    pub fn invoke_object_method(&self, proxy: &Proxy, method: ObjectMethod<'_>) -> Result<ObjectValue> {
        self.check_proxy(proxy)?;
        Ok(match method {
            ObjectMethod::HashCode => ObjectValue::Int(self.hash_code()),
            ObjectMethod::Equals(other) => ObjectValue::Bool(self.proxy_equals(proxy, other)),
            ObjectMethod::ToString => ObjectValue::Text(self.proxy_to_string(proxy)),
            ObjectMethod::Finalize => ObjectValue::Unit,
        })
    }

    pub fn hash_code(&self) -> i32 {
        self.object.hash_code()
    }

    pub(crate) fn proxy_equals(&self, proxy: &Proxy, other: &Proxy) -> bool {
        std::ptr::eq(proxy, other) || *other.handler().as_ref() == *self
    }

    pub(crate) fn proxy_to_string(&self, proxy: &Proxy) -> String {
        format!("Proxy[{},{}]", proxy.display_interface().simple_name(), self)
    }

    pub fn encode(&self, ctx: &MarshalContext, buf: &mut BytesMut) -> Result<()> {
        self.object.encode(ctx, buf)
    }

    /// Read a handler; a handler only exists around a live reference, so an
    /// empty stream is an error.
    pub fn decode(ctx: &MarshalContext, buf: &mut Bytes) -> Result<Self> {
        if !buf.has_remaining() {
            return Err(RemoteError::InvalidState(
                "no data in stream for invocation handler".to_string(),
            ));
        }
        Ok(Self::new(read_ref(ctx, buf)?))
    }
}

impl PartialEq for InvocationHandler {
    fn eq(&self, other: &Self) -> bool {
        self.object == other.object
    }
}

impl Eq for InvocationHandler {}

impl fmt::Debug for InvocationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationHandler")
            .field("reference", &self.reference)
            .finish()
    }
}

impl fmt::Display for InvocationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.object, f)
    }
}
