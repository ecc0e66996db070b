//! 서킷 브레이커 벤치마크
//!
//! 디스패치 경로에서 매 호출마다 실행되는 적격성 확인과 결과 기록의 비용을 측정합니다.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use scanrelay_breaker::{CircuitBreaker, CircuitBreakerConfig};
use scanrelay_core::clock::SystemClock;
use scanrelay_core::event::MemoryEventLog;
use scanrelay_core::types::ProviderId;

fn breaker() -> CircuitBreaker {
    CircuitBreaker::new(
        CircuitBreakerConfig::default(),
        Arc::new(SystemClock),
        Arc::new(MemoryEventLog::new(1_024)),
    )
}

fn bench_closed_path(c: &mut Criterion) {
    let breaker = breaker();
    let provider = ProviderId::new("hibp");

    let mut group = c.benchmark_group("closed_circuit");
    group.throughput(Throughput::Elements(1));

    group.bench_function("is_eligible", |b| {
        b.iter(|| breaker.is_eligible(black_box(&provider)))
    });

    group.bench_function("check_and_record_success", |b| {
        b.iter(|| {
            if breaker.is_eligible(black_box(&provider)) {
                breaker.record_outcome(black_box(&provider), true);
            }
        })
    });

    group.finish();
}

fn bench_open_path(c: &mut Criterion) {
    let breaker = breaker();
    let provider = ProviderId::new("flaky");
    breaker
        .trip(&provider)
        .expect("trip should succeed on a fresh breaker");

    c.bench_function("open_circuit/is_eligible_blocked", |b| {
        b.iter(|| breaker.is_eligible(black_box(&provider)))
    });
}

fn bench_provider_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("provider_scaling");

    for count in [1usize, 16, 128] {
        let breaker = breaker();
        let providers: Vec<ProviderId> = (0..count)
            .map(|i| ProviderId::new(format!("provider-{i}")))
            .collect();
        for p in &providers {
            breaker.is_eligible(p);
        }

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &providers, |b, providers| {
            b.iter(|| {
                for p in providers {
                    black_box(breaker.is_eligible(p));
                }
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_closed_path,
    bench_open_path,
    bench_provider_scaling
);
criterion_main!(benches);
