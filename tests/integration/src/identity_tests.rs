//! Identity Tests
//!
//! Identifier generation and identity semantics through the public API:
//! - address space ids stay unique across threads and bursts
//! - well-known ids are disjoint from each other and from generated ids
//! - remote objects over different exports never compare equal

mod common;

use bytes::BytesMut;
use common::*;
use remote_object::{AddressSpaceId, ObjectId, RemoteObject};
use std::collections::HashSet;
use std::thread;

#[test]
fn test_address_space_ids_unique_across_threads() {
    init_logging();

    const THREADS: usize = 8;
    const PER_THREAD: usize = 10_000;

    let handles: Vec<_> = (0..THREADS)
        .map(|_| thread::spawn(|| (0..PER_THREAD).map(|_| AddressSpaceId::generate()).collect::<Vec<_>>()))
        .collect();

    let mut seen = HashSet::with_capacity(THREADS * PER_THREAD);
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert((id.time(), id.count())), "duplicate {}", id);
        }
    }
    assert_eq!(seen.len(), THREADS * PER_THREAD);
}

#[test]
fn test_well_known_ids_are_disjoint() {
    let registry = ObjectId::well_known(ObjectId::REGISTRY_ID);
    let activator = ObjectId::well_known(ObjectId::ACTIVATOR_ID);
    let dgc = ObjectId::well_known(ObjectId::DGC_ID);
    assert_ne!(registry, activator);
    assert_ne!(activator, dgc);
    assert_ne!(registry, dgc);

    for n in 0..64 {
        assert!(AddressSpaceId::well_known(n).is_well_known());
        assert_ne!(AddressSpaceId::well_known(n), AddressSpaceId::generate());
        assert_ne!(ObjectId::well_known(n as i64), ObjectId::generate());
    }
}

#[test]
fn test_object_id_wire_form() {
    let id = ObjectId::generate();
    let mut buf = BytesMut::new();
    id.encode(&mut buf);
    assert_eq!(buf.len(), ObjectId::SIZE);
    assert_eq!(&buf[..8], &id.object_number().to_be_bytes());

    let decoded = ObjectId::decode(&mut buf.freeze()).unwrap();
    assert_eq!(decoded, id);
    assert_eq!(decoded.hash_code(), id.object_number() as i32);
}

#[tokio::test]
async fn test_same_endpoint_different_objects_are_unequal() {
    init_logging();

    let exporter = test_exporter();
    let a = CounterImpl::new();
    let b = CounterImpl::new();
    let proxy_a = exporter.export(a.clone(), 0).await.unwrap();
    let proxy_b = exporter.export(b.clone(), 0).await.unwrap();

    let endpoint_of = |p: &remote_object::Proxy| {
        remote_object::reference::live_ref_of(p.reference().as_ref())
            .map(|live| live.endpoint().clone())
    };
    assert_eq!(endpoint_of(&proxy_a), endpoint_of(&proxy_b));

    assert_ne!(proxy_a, proxy_b);
    assert_ne!(a.object, b.object);

    // Identity delegation: an object built over the proxy's reference
    // equals the exported implementation's identity
    let mirror = RemoteObject::with_ref("Mirror", proxy_a.reference().clone());
    assert_eq!(mirror, a.object);
    assert_eq!(mirror.hash_code(), a.object.hash_code());
    assert_ne!(mirror, b.object);
}
