// Criterion benchmarks for the completion group and aggregation
//
// Run benchmarks with:
//   cargo bench -p multirpc-client
//
// For detailed output with plots:
//   cargo bench -p multirpc-client -- --save-baseline main

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use multirpc_client::{AggregationPolicy, CallOutcome, CompletionGroup, TargetOutcome};
use multirpc_common::Target;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn targets(n: usize) -> Vec<Target> {
    (0..n)
        .map(|i| Target::parse(format!("http://10.0.0.{}:8080/RPC2", i % 250 + 1)).unwrap())
        .collect()
}

fn bench_record_completion(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_completion");

    for n in [1usize, 8, 64, 512] {
        let targets = targets(n);
        group.bench_with_input(BenchmarkId::new("sequential", n), &n, |b, &n| {
            b.iter(|| {
                let completion =
                    CompletionGroup::new("sample.add", targets.clone(), AggregationPolicy::AllOutcomes, |_, outcome| {
                        black_box(outcome);
                    })
                    .unwrap();
                for index in 0..n {
                    let _ = black_box(completion.record_completion(
                        index,
                        CallOutcome::Success(json!(12)),
                        Duration::ZERO,
                    ));
                }
            });
        });
    }

    for n in [8usize, 64] {
        let targets = targets(n);
        group.bench_with_input(BenchmarkId::new("threads", n), &n, |b, &n| {
            b.iter(|| {
                let completion = Arc::new(
                    CompletionGroup::new("sample.add", targets.clone(), AggregationPolicy::AllOutcomes, |_, outcome| {
                        black_box(outcome);
                    })
                    .unwrap(),
                );
                std::thread::scope(|scope| {
                    for index in 0..n {
                        let completion = completion.clone();
                        scope.spawn(move || {
                            let _ = completion.record_completion(
                                index,
                                CallOutcome::Success(json!(index)),
                                Duration::ZERO,
                            );
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    let outcomes: Vec<TargetOutcome> = targets(64)
        .into_iter()
        .enumerate()
        .map(|(index, target)| TargetOutcome {
            index,
            target,
            outcome: CallOutcome::Success(json!({"sum": 12})),
            arrival: 64 - index,
            latency_us: 100,
        })
        .collect();

    group.bench_function("all_outcomes_64", |b| {
        b.iter(|| AggregationPolicy::AllOutcomes.aggregate(black_box(outcomes.clone())));
    });

    group.bench_function("triggering_outcome_64", |b| {
        b.iter(|| AggregationPolicy::TriggeringOutcome.aggregate(black_box(outcomes.clone())));
    });

    group.finish();
}

criterion_group!(benches, bench_record_completion, bench_aggregate);
criterion_main!(benches);
