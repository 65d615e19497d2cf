//! Stress Tests - Concurrent Callers and Exports
//!
//! These tests exercise concurrency by:
//! - Sharing one proxy between many concurrent callers
//! - Exporting and unexporting unrelated objects in parallel
//! - Racing first use of method hashes against each other

mod common;

use common::*;
use futures::future::join_all;
use remote_object::{compute_method_hash, MethodHashCache};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Barrier;

/// Test: many callers share one proxy; every increment is observed once
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_calls_on_one_proxy() {
    init_logging();

    const CALLERS: usize = 32;
    const CALLS_PER_CALLER: usize = 25;

    let exporter = test_exporter();
    let counter = CounterImpl::new();
    let client = CounterClient::new(exporter.export(counter.clone(), 0).await.unwrap()).unwrap();
    let barrier = Arc::new(Barrier::new(CALLERS));

    let start = Instant::now();
    let tasks = (0..CALLERS).map(|_| {
        let client = client.clone();
        let barrier = barrier.clone();
        tokio::spawn(async move {
            barrier.wait().await;
            let mut seen = Vec::with_capacity(CALLS_PER_CALLER);
            for _ in 0..CALLS_PER_CALLER {
                seen.push(client.increment().await.unwrap());
            }
            seen
        })
    });

    let mut values = HashSet::new();
    for result in join_all(tasks).await {
        for value in result.unwrap() {
            assert!(values.insert(value), "value {} returned twice", value);
        }
    }
    let total = CALLERS * CALLS_PER_CALLER;
    assert_eq!(values.len(), total);
    assert_eq!(counter.value(), total as i64);
    tracing::info!("{} calls in {:?}", total, start.elapsed());
}

/// Test: unrelated objects export and unexport concurrently
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_export_unexport() {
    init_logging();

    const OBJECTS: usize = 24;

    let exporter = Arc::new(test_exporter());
    let tasks = (0..OBJECTS).map(|_| {
        let exporter = exporter.clone();
        tokio::spawn(async move {
            let counter = CounterImpl::new();
            let client = CounterClient::new(exporter.export(counter.clone(), 0).await.unwrap()).unwrap();
            assert_eq!(client.increment().await.unwrap(), 1);
            let id = exporter.object_id(counter.as_ref()).unwrap();
            assert!(exporter.unexport(counter.as_ref(), false).unwrap());
            id
        })
    });

    let ids: HashSet<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(ids.len(), OBJECTS);
    assert_eq!(exporter.exported_count(), 0);

    // All of them went through the one shared port-0 listener
    let stats = exporter.listener_stats().await;
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].1.connections_accepted, OBJECTS as u64);
}

/// Test: concurrent first lookups of a method hash agree
#[test]
fn test_method_hash_first_use_race() {
    static CACHE: std::sync::LazyLock<MethodHashCache> = std::sync::LazyLock::new(MethodHashCache::new);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            std::thread::spawn(move || {
                let method = if i % 2 == 0 { &ADD } else { &GET };
                (i % 2, CACHE.hash(method))
            })
        })
        .collect();

    for handle in handles {
        let (kind, hash) = handle.join().unwrap();
        let expected = if kind == 0 { compute_method_hash(&ADD) } else { compute_method_hash(&GET) };
        assert_eq!(hash, expected);
    }
    assert_eq!(CACHE.len(), 2);
}
