//! Latency benchmarks for the chat hub.
//!
//! These benchmarks focus on the per-event cost of the hot path.

use chathub_bench::{bench_hub, drain, populate};
use chathub_core::{validate, RateLimitConfig, RateLimiter};
use chathub_protocol::ClientEvent;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Instant;

/// Benchmark payload validation.
fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    let short = serde_json::json!("xin chao");
    let long = serde_json::json!("ư".repeat(500));
    let blank = serde_json::json!("    ");

    group.bench_function("short", |b| b.iter(|| validate(Some(black_box(&short)))));
    group.bench_function("500_chars", |b| b.iter(|| validate(Some(black_box(&long)))));
    group.bench_function("blank", |b| b.iter(|| validate(Some(black_box(&blank)))));

    group.finish();
}

/// Benchmark rate limiter admission.
fn bench_admit(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limit");

    group.bench_function("admit_allowed", |b| {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_messages: 5,
            window_ms: 1_000,
        });
        let mut now = 0u64;
        b.iter(|| {
            // Spaced past the window so every call is admitted.
            now += 1_000;
            limiter.admit(black_box("session-1"), now)
        });
    });

    group.bench_function("admit_throttled", |b| {
        let limiter = RateLimiter::default();
        for _ in 0..5 {
            limiter.admit("session-1", 10);
        }
        b.iter(|| limiter.admit(black_box("session-1"), black_box(10)));
    });

    group.finish();
}

/// Benchmark send-to-receive latency through the hub.
fn bench_send_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("send_latency");

    group.bench_function("room_of_two", |b| {
        b.iter_custom(|iters| {
            let hub = bench_hub();
            let mut sessions = populate(&hub, 2, "pair");
            let sender = sessions[0].0.clone();

            let start = Instant::now();
            for _ in 0..iters {
                hub.handle(&sender, ClientEvent::send_message("ping")).unwrap();
                for (_, rx) in &mut sessions {
                    drain(rx);
                }
            }
            start.elapsed()
        });
    });

    group.bench_function("direct", |b| {
        b.iter_custom(|iters| {
            let hub = bench_hub();
            let mut sessions = populate(&hub, 10, "crowd");
            let sender = sessions[0].0.clone();
            let recipient = hub.lookup(&sessions[9].0).unwrap().name;

            let start = Instant::now();
            for _ in 0..iters {
                let event = ClientEvent::send_direct(recipient.clone(), "psst");
                hub.handle(&sender, event).unwrap();
                drain(&mut sessions[0].1);
                drain(&mut sessions[9].1);
            }
            start.elapsed()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_validate, bench_admit, bench_send_latency);
criterion_main!(benches);
