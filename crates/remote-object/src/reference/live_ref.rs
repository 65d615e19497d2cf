//! Object id bound to an endpoint

use super::endpoint::Endpoint;
use crate::marshal::MarshalContext;
use crate::types::{ObjectId, Result};
use bytes::{Buf, BufMut};
use std::fmt;

/// Where one exported object lives: its id and the endpoint serving it
#[derive(Clone, Debug)]
pub struct LiveRef {
    id: ObjectId,
    endpoint: Endpoint,
    is_local: bool,
}

impl LiveRef {
    /// A reference held by the exporting side
    pub fn local(id: ObjectId, endpoint: Endpoint) -> Self {
        Self {
            id,
            endpoint,
            is_local: true,
        }
    }

    /// A reference reconstructed from its external form
    pub fn remote(id: ObjectId, endpoint: Endpoint) -> Self {
        Self {
            id,
            endpoint,
            is_local: false,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_local(&self) -> bool {
        self.is_local
    }

    pub fn hash_code(&self) -> i32 {
        self.id.hash_code()
    }

    /// Same object at the same endpoint; locality does not matter
    pub fn remote_equals(&self, other: &LiveRef) -> bool {
        self.id == other.id && self.endpoint == other.endpoint
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        self.id.encode(buf);
        self.endpoint.encode(buf)
    }

    pub fn decode<B: Buf>(ctx: &MarshalContext, buf: &mut B) -> Result<Self> {
        let id = ObjectId::decode(buf)?;
        let endpoint = Endpoint::decode(ctx, buf)?;
        Ok(Self::remote(id, endpoint))
    }
}

impl PartialEq for LiveRef {
    fn eq(&self, other: &Self) -> bool {
        self.remote_equals(other)
    }
}

impl Eq for LiveRef {}

impl fmt::Display for LiveRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_local { "local" } else { "remote" };
        write!(f, "[endpoint:{}({}),objID:{}]", self.endpoint, kind, self.id)
    }
}
