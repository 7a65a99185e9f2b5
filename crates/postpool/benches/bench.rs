use core::hint::black_box;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use postpool::{Completion, Coordinator, Outcome, WorkItem};
use std::time::Duration;

const ITEMS: usize = 1024;

fn noop(item: &WorkItem) -> Outcome {
    black_box(item);
    Ok(Completion::Done)
}

/// End-to-end cost of dispatching a batch: pool start, queue traffic, result
/// drain, and shutdown.
fn bench_coordinator(c: &mut Criterion) {
    let items: Vec<String> = (0..ITEMS).map(|i| format!("item-{i}")).collect();
    let mut group = c.benchmark_group("coordinator");
    group.throughput(Throughput::Elements(ITEMS as u64));

    for workers in [1_usize, 2, 4, 8, 16] {
        let coordinator = Coordinator::try_new(workers, noop)
            .expect("valid worker count")
            .with_poll_interval(Duration::from_millis(1));
        group.bench_with_input(BenchmarkId::new("noop", workers), &items, |b, items| {
            b.iter(|| {
                let report = coordinator.run(items).expect("run failed");
                black_box(report.len());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_coordinator);
criterion_main!(benches);
