//! Export Lifecycle Tests
//!
//! End-to-end over loopback sockets:
//! - export, call, unexport and the errors that follow
//! - unexport while a call is in progress, with and without force
//! - re-export after cloning with a fresh object id
//! - declared and undeclared faults crossing the wire

mod common;

use bytes::Bytes;
use common::*;
use remote_object::{
    ObjectMethod, ObjectValue, RemoteError, RemoteImpl, REMOTE_FAULT,
};

/// Export on port 0, hash locally, call remotely, unexport, call again
#[tokio::test]
async fn test_counter_scenario() {
    init_logging();

    let exporter = test_exporter();
    let counter = CounterImpl::new();
    let proxy = exporter.export(counter.clone(), 0).await.unwrap();
    let client = CounterClient::new(proxy.clone()).unwrap();

    // Identity method answered without touching the server
    let hash = proxy
        .handler()
        .invoke_object_method(&proxy, ObjectMethod::HashCode)
        .unwrap();
    assert!(matches!(hash, ObjectValue::Int(_)));
    assert_eq!(counter.calls(), 0);

    assert_eq!(client.increment().await.unwrap(), 1);
    assert_eq!(counter.calls(), 1);

    assert!(exporter.unexport(counter.as_ref(), false).unwrap());
    let err = client.increment().await.unwrap_err();
    assert!(matches!(err, RemoteError::NoSuchObject(_)), "got {:?}", err);
    assert_eq!(counter.value(), 1);
}

#[tokio::test]
async fn test_unexport_mid_call() {
    init_logging();

    let exporter = test_exporter();
    let counter = CounterImpl::new();
    let client = CounterClient::new(exporter.export(counter.clone(), 0).await.unwrap()).unwrap();

    let held = client.clone();
    let call = tokio::spawn(async move { held.hold().await });
    counter.entered.notified().await;

    // Busy: stays exported and keeps serving
    assert!(!exporter.unexport(counter.as_ref(), false).unwrap());
    assert!(exporter.is_exported(counter.as_ref()));
    assert_eq!(client.increment().await.unwrap(), 1);

    // Forced: removed at once, the in-flight call still completes
    assert!(exporter.unexport(counter.as_ref(), true).unwrap());
    counter.release.notify_one();
    call.await.unwrap().unwrap();

    assert!(matches!(
        client.increment().await,
        Err(RemoteError::NoSuchObject(_))
    ));
    assert!(matches!(
        exporter.unexport(counter.as_ref(), true),
        Err(RemoteError::NotExported(_))
    ));
}

#[tokio::test]
async fn test_reexport_of_clone_is_independent() {
    init_logging();

    let exporter = test_exporter();
    let original = CounterImpl::new();
    let original_client =
        CounterClient::new(exporter.export(original.clone(), 0).await.unwrap()).unwrap();
    original_client.add(5).await.unwrap();

    let copy = original.duplicate();
    assert!(!copy.object.has_reference());
    assert!(!exporter.is_exported(copy.as_ref()));

    let copy_client = CounterClient::new(exporter.reexport(copy.clone()).await.unwrap()).unwrap();
    let original_id = exporter.object_id(original.as_ref()).unwrap();
    let copy_id = exporter.object_id(copy.as_ref()).unwrap();
    assert_ne!(original_id, copy_id);
    assert_ne!(original_client.proxy(), copy_client.proxy());
    assert_ne!(copy.object, original.object);

    assert_eq!(copy_client.increment().await.unwrap(), 6);
    assert_eq!(original_client.get().await.unwrap(), 5);
}

#[tokio::test]
async fn test_fresh_id_after_forced_unexport() {
    init_logging();

    let exporter = test_exporter();
    let counter = CounterImpl::new();
    exporter.export(counter.clone(), 0).await.unwrap();
    let first = exporter.object_id(counter.as_ref()).unwrap();
    assert!(exporter.unexport(counter.as_ref(), true).unwrap());

    let client = CounterClient::new(exporter.export(counter.clone(), 0).await.unwrap()).unwrap();
    let second = exporter.object_id(counter.as_ref()).unwrap();
    assert_ne!(first, second);
    assert_eq!(client.increment().await.unwrap(), 1);
}

#[tokio::test]
async fn test_faults_across_the_wire() {
    init_logging();

    let exporter = test_exporter();
    let counter = std::sync::Arc::new(CounterImpl::with_limit(10));
    let client = CounterClient::new(exporter.export(counter.clone(), 0).await.unwrap()).unwrap();

    assert_eq!(client.add(10).await.unwrap(), 10);

    // Declared by add: passes through unchanged
    match client.add(1).await {
        Err(RemoteError::Application(fault)) => {
            assert_eq!(fault.type_name(), OVERFLOW);
            assert!(fault.message().contains("exceeds 10"));
        }
        other => panic!("expected overflow fault, got {:?}", other),
    }

    // Not declared by audit: wrapped, original kept as the cause
    match client.audit().await {
        Err(RemoteError::UnexpectedFault(cause)) => {
            assert_eq!(cause.type_name(), AUDIT_FAILED);
            assert!(!cause.is_assignable_to(REMOTE_FAULT));
        }
        other => panic!("expected unexpected fault, got {:?}", other),
    }
    assert_eq!(client.get().await.unwrap(), 10);
}

#[tokio::test]
async fn test_stale_method_hash_is_rejected() {
    use remote_object::MethodDescriptor;

    static RENAMED: MethodDescriptor =
        MethodDescriptor::new(COUNTER_NAME, "incrementAll", "()J", &[REMOTE_FAULT]);
    static STALE_COUNTER: remote_object::InterfaceDescriptor = remote_object::InterfaceDescriptor::new(
        COUNTER_NAME,
        &[&remote_object::REMOTE],
        &[&RENAMED],
    );

    init_logging();

    let exporter = test_exporter();
    let counter = CounterImpl::new();
    let proxy = exporter.export(counter.clone(), 0).await.unwrap();

    // A client built against a different version of the interface
    let stale = remote_object::Proxy::with_ref(&[&STALE_COUNTER], proxy.reference().clone()).unwrap();
    let err = stale.invoke(&RENAMED, Bytes::new()).await.unwrap_err();
    assert!(matches!(err, RemoteError::Server(ref msg) if msg.contains("unrecognized method hash")));
    assert_eq!(counter.calls(), 0);
}

#[tokio::test]
async fn test_exported_object_identity_matches_proxy() {
    init_logging();

    let exporter = test_exporter();
    let counter = CounterImpl::new();
    let proxy = exporter.export(counter.clone(), 0).await.unwrap();

    assert!(counter.object.equals_foreign(&proxy));
    assert_eq!(counter.object.hash_code(), proxy.handler().hash_code());
    assert!(counter.object.to_string().starts_with("CounterImpl[UnicastServerRef"));
    assert_eq!(
        counter.remote_object().and_then(|o| o.export_params()).map(|p| p.port),
        Some(0)
    );
}
