//! Benchmarks for fixed-window admission control and identity resolution.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use feedgate_core::cache::{IdentityCache, InMemoryBackend, InMemoryConfig};
use feedgate_core::identity::{Identity, IdentityResolver, InMemoryIdentityStore, Role, UserId};
use feedgate_core::ratelimit::{ClientKey, FixedWindowLimiter};

fn bench_allow_single_client(c: &mut Criterion) {
    let mut group = c.benchmark_group("ratelimit_single_client");
    group.throughput(Throughput::Elements(1));

    let open = FixedWindowLimiter::with_limits(u64::MAX, Duration::from_secs(60)).unwrap();
    let saturated = FixedWindowLimiter::with_limits(1, Duration::from_secs(3600)).unwrap();
    let key = ClientKey::from("198.51.100.1");
    saturated.allow(&key);

    group.bench_function("allowed", |b| b.iter(|| black_box(open.allow(&key))));
    group.bench_function("denied", |b| b.iter(|| black_box(saturated.allow(&key))));
    group.finish();
}

fn bench_allow_many_clients(c: &mut Criterion) {
    let mut group = c.benchmark_group("ratelimit_many_clients");

    for clients in [100usize, 10_000, 100_000] {
        let limiter = FixedWindowLimiter::with_limits(20, Duration::from_secs(60)).unwrap();
        let keys: Vec<ClientKey> = (0..clients).map(|i| ClientKey::from(format!("client-{}", i))).collect();
        for key in &keys {
            limiter.allow(key);
        }

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(clients), &keys, |b, keys| {
            let mut i = 0;
            b.iter(|| {
                i = (i + 1) % keys.len();
                black_box(limiter.allow(&keys[i]))
            });
        });
    }
    group.finish();
}

fn bench_allow_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("ratelimit_contended");

    for threads in [2usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            let limiter = Arc::new(FixedWindowLimiter::with_limits(u64::MAX, Duration::from_secs(60)).unwrap());
            b.iter(|| {
                let handles: Vec<_> = (0..threads)
                    .map(|t| {
                        let limiter = Arc::clone(&limiter);
                        thread::spawn(move || {
                            let key = ClientKey::from(format!("worker-{}", t));
                            for _ in 0..1_000 {
                                black_box(limiter.allow(&key));
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    let _ = handle.join();
                }
            });
        });
    }
    group.finish();
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("ratelimit_sweep");

    for clients in [1_000usize, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(clients), &clients, |b, &clients| {
            let limiter = FixedWindowLimiter::with_limits(20, Duration::from_secs(60)).unwrap();
            for i in 0..clients {
                limiter.allow(&ClientKey::from(format!("client-{}", i)));
            }
            b.iter(|| black_box(limiter.sweep_expired()));
        });
    }
    group.finish();
}

fn bench_resolve_cached(c: &mut Criterion) {
    let mut group = c.benchmark_group("identity_resolve");
    let rt = tokio::runtime::Runtime::new().unwrap();

    let identity = Identity::new(UserId::new(), "bench", "bench@example.com", Role::new(1, "user", 1));
    let store = Arc::new(InMemoryIdentityStore::with_identities([identity.clone()]));
    let uncached = IdentityResolver::new(store.clone());
    let cached = IdentityResolver::new(store).with_cache(IdentityCache::new(
        Arc::new(InMemoryBackend::new(InMemoryConfig::default())),
        Duration::from_secs(3600),
    ));
    rt.block_on(cached.resolve(identity.id)).unwrap();

    group.bench_function("store_only", |b| {
        b.to_async(&rt).iter(|| async { black_box(uncached.resolve(identity.id).await.unwrap()) })
    });
    group.bench_function("cache_hit", |b| {
        b.to_async(&rt).iter(|| async { black_box(cached.resolve(identity.id).await.unwrap()) })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_allow_single_client,
    bench_allow_many_clients,
    bench_allow_contended,
    bench_sweep,
    bench_resolve_cached
);
criterion_main!(benches);
