//! Unicast references
//!
//! A [`UnicastRef`] reaches a single object at a single endpoint, opening a
//! connection per call. A [`UnicastServerRef`] is the exporting side's view
//! of the same object: it marshals under a server tag but always reads back
//! as a client reference.

use super::live_ref::LiveRef;
use super::protocol::{CallMessage, ReturnMessage, ReturnStatus};
use super::remote_ref::RemoteRef;
use crate::marshal::{
    get_string, MarshalContext, UNICAST_REF, UNICAST_REF2, UNICAST_SERVER_REF,
    UNICAST_SERVER_REF2,
};
use crate::proxy::MethodDescriptor;
use crate::types::{Fault, RemoteError, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use remote_transport::{Frame, FrameKind, FrameTransport, SocketFactories, DEFAULT_MAX_FRAME_SIZE};
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, trace};

/// Client reference to one object at one endpoint
#[derive(Clone, Debug)]
pub struct UnicastRef {
    live: LiveRef,
    factories: Arc<SocketFactories>,
    max_frame_size: usize,
}

impl UnicastRef {
    pub fn new(live: LiveRef, factories: Arc<SocketFactories>) -> Self {
        Self {
            live,
            factories,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn live_ref(&self) -> &LiveRef {
        &self.live
    }

    /// Read the external form written by either unicast reference type
    pub fn read_external(ctx: &MarshalContext, buf: &mut Bytes) -> Result<Self> {
        let live = LiveRef::decode(ctx, buf)?;
        Ok(Self::new(live, ctx.factories().clone()))
    }

    async fn call(&self, method: &MethodDescriptor, args: Bytes, method_hash: i64) -> Result<Bytes> {
        let stream = self.live.endpoint().connect(&self.factories).await?;
        let mut transport = FrameTransport::new(stream).with_max_frame_size(self.max_frame_size);

        let call = CallMessage::new(self.live.id(), method_hash, args);
        trace!(
            "Call {} {:?} on {} ({} arg bytes)",
            call.call_id,
            method,
            self.live,
            call.args.len()
        );
        transport
            .write_frame(&Frame::new(FrameKind::Call, call.encode()))
            .await?;

        let reply = loop {
            let frame = transport.read_frame().await?;
            match frame.kind {
                FrameKind::Return => break ReturnMessage::decode(frame.body)?,
                FrameKind::Ping => transport.write_frame(&Frame::ping_ack()).await?,
                other => {
                    return Err(RemoteError::InvalidData(format!(
                        "unexpected {:?} frame while awaiting return",
                        other
                    )))
                }
            }
        };

        if reply.call_id != call.call_id {
            return Err(RemoteError::InvalidData(format!(
                "return for call {} while awaiting call {}",
                reply.call_id, call.call_id
            )));
        }

        match reply.status {
            ReturnStatus::Ok => Ok(reply.payload),
            ReturnStatus::ApplicationFault => {
                let mut payload = reply.payload;
                let fault = Fault::decode(&mut payload)?;
                debug!("Call {} raised {}", call.call_id, fault);
                Err(RemoteError::Application(fault))
            }
            ReturnStatus::ServerError => {
                let mut payload = reply.payload;
                Err(RemoteError::Server(get_string(&mut payload)?))
            }
            ReturnStatus::NoSuchObject => Err(RemoteError::NoSuchObject(self.live.id().to_string())),
            ReturnStatus::NoSuchMethod => Err(RemoteError::Server(format!(
                "unrecognized method hash {:#x} for {:?}",
                method_hash, method
            ))),
        }
    }
}

/// The [`LiveRef`] behind either unicast reference type
pub fn live_ref_of(reference: &dyn RemoteRef) -> Option<&LiveRef> {
    let any = reference.as_any();
    if let Some(client) = any.downcast_ref::<UnicastRef>() {
        return Some(client.live_ref());
    }
    any.downcast_ref::<UnicastServerRef>()
        .map(|server| server.client_ref().live_ref())
}

#[async_trait]
impl RemoteRef for UnicastRef {
    async fn invoke(
        &self,
        _target: &(dyn Any + Send + Sync),
        method: &'static MethodDescriptor,
        args: Bytes,
        method_hash: i64,
    ) -> Result<Bytes> {
        self.call(method, args, method_hash).await
    }

    fn remote_hash_code(&self) -> i32 {
        self.live.hash_code()
    }

    fn remote_equals(&self, other: &dyn RemoteRef) -> bool {
        live_ref_of(other).is_some_and(|live| self.live.remote_equals(live))
    }

    fn remote_to_string(&self) -> String {
        format!("UnicastRef [liveRef: {}]", self.live)
    }

    fn ref_class(&self, _ctx: &MarshalContext) -> Option<&'static str> {
        if self.live.endpoint().client_socket_factory().is_some() {
            Some(UNICAST_REF2)
        } else {
            Some(UNICAST_REF)
        }
    }

    fn write_external(&self, _ctx: &MarshalContext, buf: &mut BytesMut) -> Result<()> {
        self.live.encode(buf)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Exporting side's reference to one of its objects
#[derive(Clone, Debug)]
pub struct UnicastServerRef {
    client: UnicastRef,
}

impl UnicastServerRef {
    pub fn new(live: LiveRef, factories: Arc<SocketFactories>) -> Self {
        Self {
            client: UnicastRef::new(live, factories),
        }
    }

    pub fn live_ref(&self) -> &LiveRef {
        self.client.live_ref()
    }

    /// The client reference handed out in proxies
    pub fn client_ref(&self) -> &UnicastRef {
        &self.client
    }
}

#[async_trait]
impl RemoteRef for UnicastServerRef {
    async fn invoke(
        &self,
        target: &(dyn Any + Send + Sync),
        method: &'static MethodDescriptor,
        args: Bytes,
        method_hash: i64,
    ) -> Result<Bytes> {
        self.client.invoke(target, method, args, method_hash).await
    }

    fn remote_hash_code(&self) -> i32 {
        self.client.remote_hash_code()
    }

    fn remote_equals(&self, other: &dyn RemoteRef) -> bool {
        self.client.remote_equals(other)
    }

    fn remote_to_string(&self) -> String {
        format!("UnicastServerRef [liveRef: {}]", self.live_ref())
    }

    fn ref_class(&self, _ctx: &MarshalContext) -> Option<&'static str> {
        let endpoint = self.live_ref().endpoint();
        if endpoint.client_socket_factory().is_some() || endpoint.server_socket_factory().is_some() {
            Some(UNICAST_SERVER_REF2)
        } else {
            Some(UNICAST_SERVER_REF)
        }
    }

    fn write_external(&self, ctx: &MarshalContext, buf: &mut BytesMut) -> Result<()> {
        self.client.write_external(ctx, buf)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
