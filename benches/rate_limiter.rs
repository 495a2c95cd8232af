use criterion::{black_box, criterion_group, criterion_main, Criterion};
use payment_gateway::clock::SystemClock;
use payment_gateway::services::{FixedWindowRateLimiter, RateLimiter};
use std::sync::Arc;
use std::time::Duration;

fn bench_try_acquire(c: &mut Criterion) {
    let admitting = FixedWindowRateLimiter::new(
        u32::MAX,
        Duration::from_secs(3600),
        Duration::from_millis(100),
        Arc::new(SystemClock),
    );
    c.bench_function("try_acquire_admitted", |b| {
        b.iter(|| black_box(admitting.try_acquire(black_box(1))))
    });

    let saturated = FixedWindowRateLimiter::new(
        2,
        Duration::from_secs(3600),
        Duration::from_millis(100),
        Arc::new(SystemClock),
    );
    saturated.try_acquire(2);
    c.bench_function("try_acquire_denied", |b| {
        b.iter(|| black_box(saturated.try_acquire(black_box(1))))
    });
}

criterion_group!(benches, bench_try_acquire);
criterion_main!(benches);
