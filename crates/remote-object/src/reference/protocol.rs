//! Call and return message bodies
//!
//! A call frame carries `call_id:u32`, the target [`ObjectId`],
//! `method_hash:i64` and the marshalled arguments. A return frame carries
//! `call_id:u32`, a [`ReturnStatus`] byte and a status-specific payload.

use crate::types::{ObjectId, RemoteError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_CALL_ID: AtomicU32 = AtomicU32::new(1);

/// Allocate a call id for correlating a return with its call
pub fn next_call_id() -> u32 {
    NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed)
}

/// Outcome of a dispatched call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReturnStatus {
    /// Payload is the marshalled result
    Ok = 0,
    /// Payload is an encoded [`Fault`](crate::Fault)
    ApplicationFault = 1,
    /// Payload is a u16-prefixed message
    ServerError = 2,
    NoSuchObject = 3,
    NoSuchMethod = 4,
}

impl TryFrom<u8> for ReturnStatus {
    type Error = RemoteError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ReturnStatus::Ok),
            1 => Ok(ReturnStatus::ApplicationFault),
            2 => Ok(ReturnStatus::ServerError),
            3 => Ok(ReturnStatus::NoSuchObject),
            4 => Ok(ReturnStatus::NoSuchMethod),
            _ => Err(RemoteError::InvalidData(format!(
                "unknown return status: {}",
                value
            ))),
        }
    }
}

/// Body of a call frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMessage {
    pub call_id: u32,
    pub object_id: ObjectId,
    pub method_hash: i64,
    pub args: Bytes,
}

impl CallMessage {
    const HEADER_SIZE: usize = 4 + ObjectId::SIZE + 8;

    pub fn new(object_id: ObjectId, method_hash: i64, args: Bytes) -> Self {
        Self {
            call_id: next_call_id(),
            object_id,
            method_hash,
            args,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::HEADER_SIZE + self.args.len());
        buf.put_u32(self.call_id);
        self.object_id.encode(&mut buf);
        buf.put_i64(self.method_hash);
        buf.put_slice(&self.args);
        buf.freeze()
    }

    pub fn decode(mut body: Bytes) -> Result<Self> {
        if body.remaining() < Self::HEADER_SIZE {
            return Err(RemoteError::BufferUnderflow {
                needed: Self::HEADER_SIZE,
                have: body.remaining(),
            });
        }
        let call_id = body.get_u32();
        let object_id = ObjectId::decode(&mut body)?;
        let method_hash = body.get_i64();
        Ok(Self {
            call_id,
            object_id,
            method_hash,
            args: body,
        })
    }
}

/// Body of a return frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnMessage {
    pub call_id: u32,
    pub status: ReturnStatus,
    pub payload: Bytes,
}

impl ReturnMessage {
    pub fn new(call_id: u32, status: ReturnStatus, payload: Bytes) -> Self {
        Self {
            call_id,
            status,
            payload,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(5 + self.payload.len());
        buf.put_u32(self.call_id);
        buf.put_u8(self.status as u8);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    pub fn decode(mut body: Bytes) -> Result<Self> {
        if body.remaining() < 5 {
            return Err(RemoteError::BufferUnderflow {
                needed: 5,
                have: body.remaining(),
            });
        }
        let call_id = body.get_u32();
        let status = ReturnStatus::try_from(body.get_u8())?;
        Ok(Self {
            call_id,
            status,
            payload: body,
        })
    }
}
