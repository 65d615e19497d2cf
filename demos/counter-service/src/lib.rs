//! Remote counter shared by the demo server and client
//!
//! The server exports a [`CounterService`] and prints its proxy as hex; the
//! client decodes that hex and drives the counter through [`CounterClient`].

use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use remote_object::{
    Fault, InterfaceDescriptor, MarshalContext, MethodDescriptor, Proxy, RemoteError, RemoteImpl,
    RemoteObject, Result, REMOTE, REMOTE_FAULT,
};
use remote_transport::SocketFactories;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::info;

pub const COUNTER_NAME: &str = "demo.Counter";

/// Raised by `add` when the counter would drop below zero
pub const UNDERFLOW: &str = "demo.Underflow";

pub static ADD: MethodDescriptor =
    MethodDescriptor::new(COUNTER_NAME, "add", "(J)J", &[REMOTE_FAULT, UNDERFLOW]);
pub static VALUE: MethodDescriptor =
    MethodDescriptor::new(COUNTER_NAME, "value", "()J", &[REMOTE_FAULT]);
pub static RESET: MethodDescriptor =
    MethodDescriptor::new(COUNTER_NAME, "reset", "()V", &[REMOTE_FAULT]);

pub static COUNTER: InterfaceDescriptor =
    InterfaceDescriptor::new(COUNTER_NAME, &[&REMOTE], &[&ADD, &VALUE, &RESET]);

static SERVICE_INTERFACES: [&InterfaceDescriptor; 1] = [&COUNTER];

/// Context able to read proxies for `demo.Counter`
pub fn marshal_context(factories: Arc<SocketFactories>) -> MarshalContext {
    MarshalContext::new(factories).with_interface(&COUNTER)
}

fn long(value: i64) -> Bytes {
    let mut buf = BytesMut::with_capacity(8);
    buf.put_i64(value);
    buf.freeze()
}

fn read_long(mut reply: Bytes) -> Result<i64> {
    if reply.remaining() < 8 {
        return Err(RemoteError::BufferUnderflow {
            needed: 8,
            have: reply.remaining(),
        });
    }
    Ok(reply.get_i64())
}

/// Server side of `demo.Counter`
pub struct CounterService {
    object: RemoteObject,
    value: AtomicI64,
}

impl CounterService {
    pub fn new(initial: i64) -> Arc<Self> {
        Arc::new(Self {
            object: RemoteObject::new("CounterService"),
            value: AtomicI64::new(initial),
        })
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    fn add(&self, delta: i64) -> Result<i64> {
        let mut current = self.value();
        loop {
            let next = match current.checked_add(delta) {
                Some(next) if next >= 0 => next,
                _ => {
                    return Err(Fault::checked(
                        UNDERFLOW,
                        format!("{} + {} is below zero", current, delta),
                    )
                    .into())
                }
            };
            match self
                .value
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Ok(next),
                Err(actual) => current = actual,
            }
        }
    }
}

#[async_trait]
impl RemoteImpl for CounterService {
    fn type_name(&self) -> &'static str {
        "CounterService"
    }

    fn interfaces(&self) -> &'static [&'static InterfaceDescriptor] {
        &SERVICE_INTERFACES
    }

    async fn dispatch(&self, method: &'static MethodDescriptor, args: Bytes) -> Result<Bytes> {
        match method.name {
            "add" => {
                let delta = read_long(args)?;
                let value = self.add(delta)?;
                info!("add({}) = {}", delta, value);
                Ok(long(value))
            }
            "value" => Ok(long(self.value())),
            "reset" => {
                self.value.store(0, Ordering::SeqCst);
                info!("reset");
                Ok(Bytes::new())
            }
            other => Err(RemoteError::InvalidState(format!(
                "{} has no method {}",
                COUNTER_NAME, other
            ))),
        }
    }

    fn remote_object(&self) -> Option<&RemoteObject> {
        Some(&self.object)
    }
}

/// Typed calls over a `demo.Counter` proxy
#[derive(Clone, Debug)]
pub struct CounterClient {
    proxy: Proxy,
}

impl CounterClient {
    pub fn new(proxy: Proxy) -> Result<Self> {
        if !proxy.implements(COUNTER_NAME) {
            return Err(RemoteError::Usage(format!(
                "{} does not implement {}",
                proxy, COUNTER_NAME
            )));
        }
        Ok(Self { proxy })
    }

    /// Decode a proxy from the hex printed by the server
    pub fn from_hex(text: &str, ctx: &MarshalContext) -> Result<Self> {
        let raw = hex::decode(text.trim())
            .map_err(|e| RemoteError::InvalidData(format!("bad proxy hex: {}", e)))?;
        Self::new(Proxy::decode(ctx, &mut Bytes::from(raw))?)
    }

    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    pub async fn add(&self, delta: i64) -> Result<i64> {
        read_long(self.proxy.invoke(&ADD, long(delta)).await?)
    }

    pub async fn value(&self) -> Result<i64> {
        read_long(self.proxy.invoke(&VALUE, Bytes::new()).await?)
    }

    pub async fn reset(&self) -> Result<()> {
        self.proxy.invoke(&RESET, Bytes::new()).await.map(|_| ())
    }
}

/// Hex form of a proxy, as printed by the server
pub fn proxy_to_hex(proxy: &Proxy, ctx: &MarshalContext) -> Result<String> {
    let mut buf = BytesMut::new();
    proxy.encode(ctx, &mut buf)?;
    Ok(hex::encode(&buf))
}
