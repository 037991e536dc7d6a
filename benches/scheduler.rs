//! Criterion benchmarks for the scheduler hot paths.
//!
//! Run with:
//!   cargo bench --bench scheduler

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use jobsched::{Arguments, Manager, Options, Runnable, Scheduler};

fn nop(_sched: &Scheduler, _args: &Arguments) {}

fn bench_ready_batches(c: &mut Criterion) {
    let manager = Manager::new(Options {
        num_threads: 4,
        free_list_size: 2048,
        ready_list_size: 1024,
    })
    .unwrap();

    let mut group = c.benchmark_group("submit_ready_batch");
    for &batch in &[16usize, 128, 512] {
        let runnables = vec![nop as Runnable; batch];
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, _| {
            b.iter(|| manager.insert_ready_batch(&runnables, &[]).wait_on())
        });
    }
    group.finish();
}

fn bench_dependency_chain(c: &mut Criterion) {
    let manager = Manager::new(Options {
        num_threads: 4,
        free_list_size: 2048,
        ready_list_size: 1024,
    })
    .unwrap();

    // Chain latency: each link becomes ready only when its predecessor
    // completes, so this measures the hand-off path more than the queue.
    let mut group = c.benchmark_group("dependency_chain");
    for &length in &[16usize, 128] {
        group.throughput(Throughput::Elements(length as u64));
        group.bench_with_input(BenchmarkId::from_parameter(length), &length, |b, &length| {
            b.iter(|| {
                let mut previous = manager.insert_ready(Some(nop), Arguments::default());
                for _ in 1..length {
                    previous = manager.insert_after(Some(nop), Arguments::default(), &[previous]);
                }
                previous.wait_on();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ready_batches, bench_dependency_chain);
criterion_main!(benches);
