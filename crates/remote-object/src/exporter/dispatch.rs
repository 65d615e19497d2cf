//! Server-side call dispatch
//!
//! Serves the connections of one listener: reads call frames, finds the
//! target in the export table, runs the method and writes the return frame.

use super::object_table::{ListenerKey, ObjectTable};
use crate::marshal::put_string;
use crate::reference::{CallMessage, ReturnMessage, ReturnStatus};
use crate::types::RemoteError;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use remote_transport::{ConnectionHandler, Frame, FrameKind, FrameTransport};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

/// Longest server error message sent back to a caller, in characters
const MAX_ERROR_CHARS: usize = 1024;

/// Routes calls arriving on one listener to exported objects
pub struct CallDispatcher {
    table: Arc<ObjectTable>,
    listener: ListenerKey,
    max_frame_size: usize,
}

impl CallDispatcher {
    pub fn new(table: Arc<ObjectTable>, listener: ListenerKey, max_frame_size: usize) -> Self {
        Self {
            table,
            listener,
            max_frame_size,
        }
    }

    /// Run one call to completion and build its reply
    pub async fn dispatch_call(&self, body: Bytes, peer: SocketAddr) -> ReturnMessage {
        let call = match CallMessage::decode(body) {
            Ok(call) => call,
            Err(e) => {
                warn!("Malformed call from {}: {}", peer, e);
                return server_error(0, &e.to_string());
            }
        };

        // Objects are only reachable through the listener they were exported on
        let guard = match self.table.begin_call(&call.object_id) {
            Some(guard) if guard.listener == self.listener => guard,
            _ => {
                debug!("Call {} for unknown object {}", call.call_id, call.object_id);
                return ReturnMessage::new(call.call_id, ReturnStatus::NoSuchObject, Bytes::new());
            }
        };

        let method = match guard.method(call.method_hash) {
            Some(method) => method,
            None => {
                debug!(
                    "Call {} with unknown method hash {:#x} on {}",
                    call.call_id, call.method_hash, call.object_id
                );
                return ReturnMessage::new(call.call_id, ReturnStatus::NoSuchMethod, Bytes::new());
            }
        };

        trace!("Dispatching {:?} on {} from {}", method, call.object_id, peer);
        match guard.implementation.dispatch(method, call.args).await {
            Ok(result) => ReturnMessage::new(call.call_id, ReturnStatus::Ok, result),
            Err(RemoteError::Application(fault)) => {
                let mut payload = BytesMut::new();
                match fault.encode(&mut payload) {
                    Ok(()) => ReturnMessage::new(
                        call.call_id,
                        ReturnStatus::ApplicationFault,
                        payload.freeze(),
                    ),
                    Err(e) => server_error(call.call_id, &e.to_string()),
                }
            }
            Err(e) => {
                warn!("{:?} on {} failed: {}", method, call.object_id, e);
                server_error(call.call_id, &e.to_string())
            }
        }
    }
}

fn server_error(call_id: u32, message: &str) -> ReturnMessage {
    let message: String = message.chars().take(MAX_ERROR_CHARS).collect();
    let mut payload = BytesMut::new();
    if let Err(e) = put_string(&mut payload, &message) {
        warn!("Dropping server error message: {}", e);
        payload.clear();
    }
    ReturnMessage::new(call_id, ReturnStatus::ServerError, payload.freeze())
}

#[async_trait]
impl ConnectionHandler for CallDispatcher {
    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> remote_transport::Result<()> {
        let mut transport = FrameTransport::new(stream).with_max_frame_size(self.max_frame_size);

        loop {
            let frame = transport.read_frame().await?;
            match frame.kind {
                FrameKind::Call => {
                    let reply = self.dispatch_call(frame.body, peer).await;
                    transport
                        .write_frame(&Frame::new(FrameKind::Return, reply.encode()))
                        .await?;
                }
                FrameKind::Ping => transport.write_frame(&Frame::ping_ack()).await?,
                other => debug!("Ignoring {:?} frame from {}", other, peer),
            }
        }
    }
}
