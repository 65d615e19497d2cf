//! Common test utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use remote_object::{
    Exporter, Fault, InterfaceDescriptor, MarshalContext, MethodDescriptor, Proxy, RemoteError,
    RemoteImpl, RemoteObject, RemoteRef, Result, RuntimeConfig, REMOTE, REMOTE_FAULT,
};
use remote_transport::SocketFactories;
use std::any::Any;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install the test log subscriber once per test binary (honours RUST_LOG)
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// An exporter with its own socket factory state, bound to loopback
pub fn test_exporter() -> Exporter {
    Exporter::new(
        RuntimeConfig::default().with_host_name("127.0.0.1"),
        Arc::new(SocketFactories::new()),
    )
}

pub const COUNTER_NAME: &str = "test.Counter";
pub const OVERFLOW: &str = "test.Overflow";
pub const AUDIT_FAILED: &str = "test.AuditFailed";

pub static INCREMENT: MethodDescriptor =
    MethodDescriptor::new(COUNTER_NAME, "increment", "()J", &[REMOTE_FAULT]);
pub static ADD: MethodDescriptor =
    MethodDescriptor::new(COUNTER_NAME, "add", "(J)J", &[REMOTE_FAULT, OVERFLOW]);
pub static GET: MethodDescriptor = MethodDescriptor::new(COUNTER_NAME, "get", "()J", &[REMOTE_FAULT]);
pub static AUDIT: MethodDescriptor = MethodDescriptor::new(COUNTER_NAME, "audit", "()V", &[REMOTE_FAULT]);
pub static HOLD: MethodDescriptor = MethodDescriptor::new(COUNTER_NAME, "hold", "()V", &[REMOTE_FAULT]);

pub static COUNTER: InterfaceDescriptor = InterfaceDescriptor::new(
    COUNTER_NAME,
    &[&REMOTE],
    &[&INCREMENT, &ADD, &GET, &AUDIT, &HOLD],
);

static COUNTER_INTERFACES: [&InterfaceDescriptor; 1] = [&COUNTER];

/// Counter implementation exported by the tests
///
/// `add` faults with a declared overflow past `limit`; `audit` always raises
/// a checked fault `test.Counter` does not declare; `hold` parks until
/// released so tests can observe a call in progress.
pub struct CounterImpl {
    pub object: RemoteObject,
    pub value: AtomicI64,
    pub limit: i64,
    pub calls: AtomicUsize,
    pub entered: Notify,
    pub release: Notify,
}

impl CounterImpl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_limit(i64::MAX))
    }

    pub fn with_limit(limit: i64) -> Self {
        Self {
            object: RemoteObject::new("CounterImpl"),
            value: AtomicI64::new(0),
            limit,
            calls: AtomicUsize::new(0),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// A copy with the current value and the identity's export parameters,
    /// but no reference
    pub fn duplicate(&self) -> Arc<Self> {
        Arc::new(Self {
            object: self.object.clone(),
            value: AtomicI64::new(self.value()),
            limit: self.limit,
            calls: AtomicUsize::new(0),
            entered: Notify::new(),
            release: Notify::new(),
        })
    }
}

fn long_reply(value: i64) -> Bytes {
    let mut out = BytesMut::with_capacity(8);
    out.put_i64(value);
    out.freeze()
}

#[async_trait]
impl RemoteImpl for CounterImpl {
    fn type_name(&self) -> &'static str {
        "CounterImpl"
    }

    fn interfaces(&self) -> &'static [&'static InterfaceDescriptor] {
        &COUNTER_INTERFACES
    }

    async fn dispatch(&self, method: &'static MethodDescriptor, mut args: Bytes) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match method.name {
            "increment" => Ok(long_reply(self.value.fetch_add(1, Ordering::SeqCst) + 1)),
            "add" => {
                if args.remaining() < 8 {
                    return Err(RemoteError::InvalidData("add expects a long".to_string()));
                }
                let delta = args.get_i64();
                let current = self.value();
                match current.checked_add(delta).filter(|v| *v <= self.limit) {
                    Some(_) => Ok(long_reply(self.value.fetch_add(delta, Ordering::SeqCst) + delta)),
                    None => Err(Fault::checked(OVERFLOW, format!("{} + {} exceeds {}", current, delta, self.limit)).into()),
                }
            }
            "get" => Ok(long_reply(self.value())),
            "audit" => Err(Fault::checked(AUDIT_FAILED, "books do not balance").into()),
            "hold" => {
                self.entered.notify_one();
                self.release.notified().await;
                Ok(Bytes::new())
            }
            other => Err(RemoteError::InvalidState(format!("no method {}", other))),
        }
    }

    fn remote_object(&self) -> Option<&RemoteObject> {
        Some(&self.object)
    }
}

/// Typed client adapter for `test.Counter`
#[derive(Clone, Debug)]
pub struct CounterClient {
    proxy: Proxy,
}

impl CounterClient {
    pub fn new(proxy: Proxy) -> Result<Self> {
        if !proxy.implements(COUNTER_NAME) {
            return Err(RemoteError::Usage(format!("{} is not a {}", proxy, COUNTER_NAME)));
        }
        Ok(Self { proxy })
    }

    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    async fn call_long(&self, method: &'static MethodDescriptor, args: Bytes) -> Result<i64> {
        let mut reply = self.proxy.invoke(method, args).await?;
        if reply.remaining() < 8 {
            return Err(RemoteError::InvalidData("expected a long result".to_string()));
        }
        Ok(reply.get_i64())
    }

    pub async fn increment(&self) -> Result<i64> {
        self.call_long(&INCREMENT, Bytes::new()).await
    }

    pub async fn add(&self, delta: i64) -> Result<i64> {
        self.call_long(&ADD, long_reply(delta)).await
    }

    pub async fn get(&self) -> Result<i64> {
        self.call_long(&GET, Bytes::new()).await
    }

    pub async fn audit(&self) -> Result<()> {
        self.proxy.invoke(&AUDIT, Bytes::new()).await.map(|_| ())
    }

    pub async fn hold(&self) -> Result<()> {
        self.proxy.invoke(&HOLD, Bytes::new()).await.map(|_| ())
    }
}

/// Reference that never leaves the process: counts calls and echoes args
#[derive(Debug, Default)]
pub struct CountingRef {
    pub invocations: AtomicUsize,
    pub hashes: Mutex<Vec<i64>>,
}

impl CountingRef {
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteRef for CountingRef {
    async fn invoke(
        &self,
        _target: &(dyn Any + Send + Sync),
        _method: &'static MethodDescriptor,
        args: Bytes,
        method_hash: i64,
    ) -> Result<Bytes> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.hashes.lock().push(method_hash);
        Ok(args)
    }

    fn remote_hash_code(&self) -> i32 {
        0x5eed
    }

    fn remote_equals(&self, other: &dyn RemoteRef) -> bool {
        std::ptr::eq(self.as_any(), other.as_any())
    }

    fn remote_to_string(&self) -> String {
        "CountingRef".to_string()
    }

    fn ref_class(&self, _ctx: &MarshalContext) -> Option<&'static str> {
        None
    }

    fn write_external(&self, _ctx: &MarshalContext, _buf: &mut BytesMut) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
