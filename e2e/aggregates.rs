//! E2E Test Suite 03: Batch Submission and Aggregators
//!
//! Validates fan-in through `insert_ready_batch` (the returned handle
//! completes only after every child), the three batch argument arities,
//! and the gate semantics of `insert_blocked_batch`.

use jobsched::{Arguments, Manager, Options, Runnable, Scheduler};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

fn manager(num_threads: usize, free_list_size: usize, ready_list_size: usize) -> Manager {
    let _ = env_logger::builder().is_test(true).try_init();
    Manager::new(Options {
        num_threads,
        free_list_size,
        ready_list_size,
    })
    .expect("manager construction must succeed")
}

fn leak_cells(count: usize) -> &'static [AtomicUsize] {
    Box::leak(
        (0..count)
            .map(|_| AtomicUsize::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice(),
    )
}

fn cells_of(args: &Arguments) -> &'static [AtomicUsize] {
    unsafe { std::slice::from_raw_parts(args.a0 as *const AtomicUsize, args.a1) }
}

fn bump(_sched: &Scheduler, args: &Arguments) {
    cells_of(args)[0].fetch_add(1, Ordering::SeqCst);
}

/// Spin until `cell` reaches `expected` or the deadline passes.
fn await_count(cell: &AtomicUsize, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while cell.load(Ordering::SeqCst) != expected {
        assert!(Instant::now() < deadline, "timed out waiting for {expected}");
        std::thread::yield_now();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: Ten-way fan-in through a batch aggregator
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn batch_aggregator_joins_all_children() {
    let manager = manager(4, 32, 16);
    let cells = leak_cells(1);
    let args = [Arguments::new(cells.as_ptr() as usize, 1, 0, 0)];

    let runnables = [bump as Runnable; 10];
    let aggregate = manager.insert_ready_batch(&runnables, &args);

    aggregate.wait_on();
    // The aggregate completing implies every child completed first.
    assert_eq!(cells[0].load(Ordering::SeqCst), 10);
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: Children finish before the aggregate is observable as done
// ─────────────────────────────────────────────────────────────────────────────

fn slow_bump(_sched: &Scheduler, args: &Arguments) {
    std::thread::sleep(Duration::from_millis(5));
    cells_of(args)[0].fetch_add(1, Ordering::SeqCst);
}

#[test]
fn aggregate_never_completes_early() {
    let manager = manager(4, 32, 16);
    let cells = leak_cells(1);
    let args = [Arguments::new(cells.as_ptr() as usize, 1, 0, 0)];

    let runnables = [slow_bump as Runnable; 8];
    let aggregate = manager.insert_ready_batch(&runnables, &args);

    aggregate.wait_on();
    assert_eq!(
        cells[0].load(Ordering::SeqCst),
        8,
        "aggregate completed before its children"
    );
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: Batch with no arguments at all
// ─────────────────────────────────────────────────────────────────────────────

static ARGLESS_RUNS: AtomicUsize = AtomicUsize::new(0);

fn argless(_sched: &Scheduler, _args: &Arguments) {
    ARGLESS_RUNS.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn batch_without_arguments() {
    let manager = manager(2, 16, 8);
    let runnables = [argless as Runnable; 5];

    let aggregate = manager.insert_ready_batch(&runnables, &[]);
    aggregate.wait_on();

    assert_eq!(ARGLESS_RUNS.load(Ordering::SeqCst), 5);
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: Batch with one argument tuple per job
// ─────────────────────────────────────────────────────────────────────────────

// Write a3 into slot a2.
fn write_tagged(_sched: &Scheduler, args: &Arguments) {
    cells_of(args)[args.a2].store(args.a3, Ordering::SeqCst);
}

#[test]
fn batch_with_per_job_arguments() {
    let manager = manager(4, 16, 8);
    let cells = leak_cells(6);
    let base = cells.as_ptr() as usize;

    let runnables = [write_tagged as Runnable; 6];
    let args: Vec<Arguments> = (0..6)
        .map(|slot| Arguments::new(base, 6, slot, 100 + slot))
        .collect();

    let aggregate = manager.insert_ready_batch(&runnables, &args);
    aggregate.wait_on();

    for slot in 0..6 {
        assert_eq!(cells[slot].load(Ordering::SeqCst), 100 + slot);
    }
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: Blocked batch parks the whole collection behind one gate
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn blocked_batch_waits_for_the_gate() {
    let manager = manager(4, 32, 16);
    let cells = leak_cells(1);
    let args = [Arguments::new(cells.as_ptr() as usize, 1, 0, 0)];

    let runnables = [bump as Runnable; 6];
    let gate = manager.insert_blocked_batch(&runnables, &args);

    // Nothing may run while the gate is closed.
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(cells[0].load(Ordering::SeqCst), 0);

    gate.release_barrier(1);

    // The gate handle completes when the gate opens; the children are
    // tracked through their side effects.
    gate.wait_on();
    await_count(&cells[0], 6);
    manager.shutdown();
}
