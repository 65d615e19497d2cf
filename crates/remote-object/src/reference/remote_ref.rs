//! The remote reference contract

use crate::marshal::MarshalContext;
use crate::proxy::MethodDescriptor;
use crate::types::Result;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::any::Any;
use std::fmt;

/// A handle able to perform calls on one remote object
///
/// Implementations are transport specific. A reference must tolerate any
/// number of concurrent and repeated calls.
#[async_trait]
pub trait RemoteRef: Send + Sync + fmt::Debug {
    /// Perform one remote call.
    ///
    /// `target` is the local stand-in the call was made on. `args` and the
    /// returned bytes are the already-marshalled argument list and result.
    /// A fault raised by the remote method comes back as
    /// [`RemoteError::Application`](crate::RemoteError::Application);
    /// everything else is a transport or server failure.
    async fn invoke(
        &self,
        target: &(dyn Any + Send + Sync),
        method: &'static MethodDescriptor,
        args: Bytes,
        method_hash: i64,
    ) -> Result<Bytes>;

    /// Hash that agrees with [`remote_equals`](Self::remote_equals)
    fn remote_hash_code(&self) -> i32;

    /// Whether both references name the same remote object instance
    fn remote_equals(&self, other: &dyn RemoteRef) -> bool;

    fn remote_to_string(&self) -> String;

    /// Tag of this reference's external form, or `None` to use the
    /// context's generic codec.
    fn ref_class(&self, ctx: &MarshalContext) -> Option<&'static str>;

    /// Write the external form read back by the decoder registered for
    /// [`ref_class`](Self::ref_class).
    fn write_external(&self, ctx: &MarshalContext, buf: &mut BytesMut) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}
