//! Socket Factory Tests
//!
//! Pluggable socket creation end to end:
//! - the process-wide factory is assignable once
//! - exports with their own factories route every socket through them
//! - references carrying a client factory resolve it by descriptor

mod common;

use async_trait::async_trait;
use bytes::BytesMut;
use common::*;
use remote_object::marshal::{get_string, UNICAST_SERVER_REF2};
use remote_object::{ExportParams, MarshalContext, Proxy, RemoteError};
use remote_transport::{
    ClientSocketFactory, DirectSocketFactory, FactoryIdentity, ServerSocketFactory,
    SocketFactories, TransportError,
};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

/// Direct sockets, counted
#[derive(Debug, Default)]
struct CountingFactory {
    clients: AtomicUsize,
    servers: AtomicUsize,
}

impl FactoryIdentity for CountingFactory {
    fn descriptor(&self) -> &str {
        "counting"
    }
}

#[async_trait]
impl ClientSocketFactory for CountingFactory {
    async fn create_socket(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        self.clients.fetch_add(1, Ordering::SeqCst);
        DirectSocketFactory.create_socket(host, port).await
    }
}

#[async_trait]
impl ServerSocketFactory for CountingFactory {
    async fn create_server_socket(&self, port: u16) -> io::Result<TcpListener> {
        self.servers.fetch_add(1, Ordering::SeqCst);
        DirectSocketFactory.create_server_socket(port).await
    }
}

/// The only test in this binary touching the process-wide state
#[test]
fn test_global_factory_single_assignment() {
    let global = SocketFactories::global();
    global
        .set_socket_factory(Arc::new(CountingFactory::default()))
        .unwrap();

    let second = global.set_socket_factory(Arc::new(DirectSocketFactory));
    assert!(matches!(second, Err(TransportError::AlreadyDefined(_))));
    assert_eq!(global.effective().descriptor(), "counting");

    let third = global.set_socket_factory(Arc::new(CountingFactory::default()));
    assert!(third.is_err());
    assert_eq!(global.effective().descriptor(), "counting");
}

#[tokio::test]
async fn test_export_with_custom_factories() {
    init_logging();

    let factory = Arc::new(CountingFactory::default());
    let exporter = test_exporter();
    exporter.factories().register_client_factory(factory.clone());

    let counter = CounterImpl::new();
    let params = ExportParams::new(0)
        .with_client_factory(factory.clone())
        .with_server_factory(factory.clone());
    let proxy = exporter.export_with(counter.clone(), params).await.unwrap();
    assert_eq!(factory.servers.load(Ordering::SeqCst), 1);

    let client = CounterClient::new(proxy.clone()).unwrap();
    client.increment().await.unwrap();
    client.increment().await.unwrap();
    assert_eq!(factory.clients.load(Ordering::SeqCst), 2);

    // A second export through the same factory shares the listener
    exporter
        .export_with(
            CounterImpl::new(),
            ExportParams::new(0).with_server_factory(factory.clone()),
        )
        .await
        .unwrap();
    assert_eq!(factory.servers.load(Ordering::SeqCst), 1);

    // The server identity is tagged as carrying factories
    let ctx = MarshalContext::new(exporter.factories().clone()).with_interface(&COUNTER);
    let mut buf = BytesMut::new();
    counter.object.encode(&ctx, &mut buf).unwrap();
    let mut bytes = buf.freeze();
    assert_eq!(get_string(&mut bytes).unwrap(), UNICAST_SERVER_REF2);

    // The proxy travels with the factory descriptor and resolves it again
    let mut buf = BytesMut::new();
    proxy.encode(&ctx, &mut buf).unwrap();
    let received = Proxy::decode(&ctx, &mut buf.freeze()).unwrap();
    CounterClient::new(received).unwrap().increment().await.unwrap();
    assert_eq!(factory.clients.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_unknown_client_factory_on_receipt() {
    init_logging();

    let factory = Arc::new(CountingFactory::default());
    let exporter = test_exporter();
    let proxy = exporter
        .export_with(
            CounterImpl::new(),
            ExportParams::new(0).with_client_factory(factory),
        )
        .await
        .unwrap();

    let sender = MarshalContext::new(exporter.factories().clone()).with_interface(&COUNTER);
    let mut buf = BytesMut::new();
    proxy.encode(&sender, &mut buf).unwrap();

    // The receiving side has never heard of "counting"
    let receiver = MarshalContext::new(Arc::new(SocketFactories::new())).with_interface(&COUNTER);
    let result = Proxy::decode(&receiver, &mut buf.freeze());
    assert!(matches!(result, Err(RemoteError::UnknownSocketFactory(name)) if name == "counting"));
}

#[tokio::test]
async fn test_bind_failure_is_retryable_by_default() {
    init_logging();

    let occupied = TcpListener::bind("0.0.0.0:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let exporter = test_exporter();
    let err = exporter.export(CounterImpl::new(), port).await.unwrap_err();
    assert!(err.is_retryable());

    // The caller drives the retry once the port frees up
    drop(occupied);
    let proxy = exporter.export(CounterImpl::new(), port).await.unwrap();
    CounterClient::new(proxy).unwrap().increment().await.unwrap();
}
