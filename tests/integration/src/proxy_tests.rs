//! Proxy Tests
//!
//! Client-side behaviour of proxies and their invocation handler:
//! - identity methods and finalization never reach the reference
//! - proxies marshalled to bytes come back callable
//! - unknown reference tags and empty handler streams are rejected

mod common;

use bytes::{Bytes, BytesMut};
use common::*;
use remote_object::marshal::{put_string, UNICAST_REF};
use remote_object::{
    method_hash, InterfaceDescriptor, InvocationHandler, MarshalContext, MethodDescriptor,
    ObjectMethod, ObjectValue, Proxy, RemoteError, RemoteObject, REMOTE,
};
use std::sync::Arc;

static FINALIZE: MethodDescriptor = MethodDescriptor::new(COUNTER_NAME, "finalize", "()V", &[]);

static NOTES: InterfaceDescriptor = InterfaceDescriptor::new("test.Notes", &[], &[]);

#[tokio::test]
async fn test_identity_methods_never_reach_reference() {
    init_logging();

    let reference = Arc::new(CountingRef::default());
    let proxy = Proxy::with_ref(&[&REMOTE, &COUNTER], reference.clone()).unwrap();
    let twin = Proxy::new(&[&REMOTE, &COUNTER], proxy.handler().clone()).unwrap();
    let handler = proxy.handler();

    assert_eq!(
        handler.invoke_object_method(&proxy, ObjectMethod::HashCode).unwrap(),
        ObjectValue::Int(0x5eed)
    );
    assert_eq!(
        handler.invoke_object_method(&proxy, ObjectMethod::Equals(&twin)).unwrap(),
        ObjectValue::Bool(true)
    );
    assert_eq!(
        handler.invoke_object_method(&proxy, ObjectMethod::ToString).unwrap(),
        ObjectValue::Text("Proxy[Counter,InvocationHandler[CountingRef]]".to_string())
    );
    handler.invoke_object_method(&proxy, ObjectMethod::Finalize).unwrap();
    proxy.invoke(&FINALIZE, Bytes::new()).await.unwrap();

    // std trait impls go through the same local path
    let _ = proxy.to_string();
    assert_eq!(proxy, twin);

    assert_eq!(reference.invocations(), 0);

    proxy.invoke(&INCREMENT, Bytes::new()).await.unwrap();
    assert_eq!(reference.invocations(), 1);
    assert_eq!(*reference.hashes.lock(), vec![method_hash(&INCREMENT)]);
}

#[tokio::test]
async fn test_handler_rejects_foreign_proxy() {
    let proxy = Proxy::with_ref(&[&COUNTER], Arc::new(CountingRef::default())).unwrap();
    let other = InvocationHandler::new(Arc::new(CountingRef::default()));

    let result = other.invoke(&proxy, &INCREMENT, Bytes::new()).await;
    assert!(matches!(result, Err(RemoteError::Usage(_))));
}

#[tokio::test]
async fn test_proxy_without_remote_interface() {
    let reference = Arc::new(CountingRef::default());
    let proxy = Proxy::with_ref(&[&NOTES], reference.clone()).unwrap();

    let result = proxy.invoke(&INCREMENT, Bytes::new()).await;
    assert!(matches!(result, Err(RemoteError::Usage(_))));
    assert_eq!(reference.invocations(), 0);
}

#[tokio::test]
async fn test_marshalled_proxy_is_callable() {
    init_logging();

    let exporter = test_exporter();
    let counter = CounterImpl::new();
    let proxy = exporter.export(counter.clone(), 0).await.unwrap();

    let ctx = MarshalContext::new(exporter.factories().clone()).with_interface(&COUNTER);
    let mut buf = BytesMut::new();
    proxy.encode(&ctx, &mut buf).unwrap();

    let received = Proxy::decode(&ctx, &mut buf.freeze()).unwrap();
    assert_eq!(received, proxy);
    assert!(received.to_string().starts_with("Proxy[Counter,InvocationHandler[UnicastRef"));

    let client = CounterClient::new(received).unwrap();
    assert_eq!(client.increment().await.unwrap(), 1);
    assert_eq!(client.add(4).await.unwrap(), 5);
    assert_eq!(counter.value(), 5);
}

#[tokio::test]
async fn test_exported_identity_marshals_as_server_ref() {
    init_logging();

    let exporter = test_exporter();
    let counter = CounterImpl::new();
    exporter.export(counter.clone(), 0).await.unwrap();

    let ctx = MarshalContext::new(exporter.factories().clone());
    let mut buf = BytesMut::new();
    counter.object.encode(&ctx, &mut buf).unwrap();

    let stub = RemoteObject::decode("CounterStub", &ctx, &mut buf.freeze()).unwrap();
    assert_eq!(stub, counter.object);
    assert!(stub.to_string().starts_with("CounterStub[UnicastRef"));
}

#[test]
fn test_unknown_tag_and_empty_stream() {
    let ctx = MarshalContext::default();

    let mut buf = BytesMut::new();
    put_string(&mut buf, "ActivatableRef").unwrap();
    let result = InvocationHandler::decode(&ctx, &mut buf.freeze());
    assert!(matches!(result, Err(RemoteError::UnresolvableRef(tag)) if tag == "ActivatableRef"));

    let result = InvocationHandler::decode(&ctx, &mut Bytes::new());
    assert!(matches!(result, Err(RemoteError::InvalidState(_))));

    // A known tag over a truncated body is a decode error, not a panic
    let mut buf = BytesMut::new();
    put_string(&mut buf, UNICAST_REF).unwrap();
    let result = InvocationHandler::decode(&ctx, &mut buf.freeze());
    assert!(matches!(result, Err(RemoteError::BufferUnderflow { .. })));
}

#[test]
fn test_typed_adapter_checks_interface() {
    let proxy = Proxy::with_ref(&[&NOTES], Arc::new(CountingRef::default())).unwrap();
    assert!(matches!(CounterClient::new(proxy), Err(RemoteError::Usage(_))));
}
