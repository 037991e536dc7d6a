//! E2E Test Suite 05: Stress
//!
//! Larger graphs: a binary reduction tree, successor-list overflow into
//! chained aggregators, pool churn well past the pool size, and
//! submission from multiple threads at once.

use jobsched::{Arguments, JobHandle, Manager, Options, Runnable, Scheduler};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

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

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: Binary reduction tree, 1023 jobs, depth 10
// ─────────────────────────────────────────────────────────────────────────────

const LEAVES: usize = 512;
const NODES: usize = 2 * LEAVES - 1;

// Leaf node a2: write its own value.
fn tree_leaf(_sched: &Scheduler, args: &Arguments) {
    cells_of(args)[args.a2].store(1, Ordering::SeqCst);
}

// Interior node a2: sum the two children, which completed first.
fn tree_sum(_sched: &Scheduler, args: &Arguments) {
    let cells = cells_of(args);
    let node = args.a2;
    let sum = cells[2 * node + 1].load(Ordering::SeqCst) + cells[2 * node + 2].load(Ordering::SeqCst);
    cells[node].store(sum, Ordering::SeqCst);
}

#[test]
fn binary_reduction_tree() {
    let manager = manager(4, 2048, 1024);
    let cells = leak_cells(NODES);
    let base = cells.as_ptr() as usize;

    // Heap-indexed tree: node n has children 2n+1 and 2n+2; nodes
    // LEAVES-1 .. NODES-1 are the leaves.
    let mut handles: Vec<Option<JobHandle>> = vec![None; NODES];
    for node in (0..NODES).rev() {
        let args = Arguments::new(base, NODES, node, 0);
        let handle = if node >= LEAVES - 1 {
            manager.insert_ready(Some(tree_leaf), args)
        } else {
            let left = handles[2 * node + 1].take().unwrap();
            let right = handles[2 * node + 2].take().unwrap();
            manager.insert_after(Some(tree_sum), args, &[left, right])
        };
        handles[node] = Some(handle);
    }

    handles[0].take().unwrap().wait_on();
    assert_eq!(cells[0].load(Ordering::SeqCst), LEAVES);
    // Shutdown re-checks that all 1023 records came home.
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: 1000 successors on one antecedent exercise overflow chaining
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn thousand_successors_all_signal_once() {
    const SUCCESSORS: usize = 1000;
    let manager = manager(4, 2048, 2048);
    let cells = leak_cells(1);
    let args = Arguments::new(cells.as_ptr() as usize, 1, 0, 0);

    // Park the antecedent so every successor append lands on a live
    // record and the inline list has to chain.
    let gate = manager.insert_blocked(None, Arguments::default());

    let successors: Vec<JobHandle> = (0..SUCCESSORS)
        .map(|_| manager.insert_after(Some(bump), args, &[gate.handle().clone()]))
        .collect();

    assert_eq!(cells[0].load(Ordering::SeqCst), 0);
    gate.release_barrier(1);

    for successor in &successors {
        successor.wait_on();
    }
    assert_eq!(cells[0].load(Ordering::SeqCst), SUCCESSORS);
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: Pool churn far beyond the pool size, exactly-once execution
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn pool_recycles_under_sustained_load() {
    const BATCHES: usize = 20;
    const PER_BATCH: usize = 100;
    let manager = manager(4, 256, 128);
    let cells = leak_cells(1);
    let args = [Arguments::new(cells.as_ptr() as usize, 1, 0, 0)];

    let runnables = [bump as Runnable; PER_BATCH];
    for _ in 0..BATCHES {
        manager.insert_ready_batch(&runnables, &args).wait_on();
    }

    assert_eq!(cells[0].load(Ordering::SeqCst), BATCHES * PER_BATCH);
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: Concurrent submitters share one scheduler
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn many_threads_submit_concurrently() {
    const SUBMITTERS: usize = 4;
    const PER_SUBMITTER: usize = 500;
    let manager = manager(4, 512, 256);
    let cells = leak_cells(1);
    let args = Arguments::new(cells.as_ptr() as usize, 1, 0, 0);

    let submitters: Vec<_> = (0..SUBMITTERS)
        .map(|_| {
            let sched = manager.scheduler().clone();
            thread::spawn(move || {
                for _ in 0..PER_SUBMITTER {
                    sched.insert_ready(Some(bump), args).wait_on();
                }
            })
        })
        .collect();

    for submitter in submitters {
        submitter.join().unwrap();
    }

    assert_eq!(
        cells[0].load(Ordering::SeqCst),
        SUBMITTERS * PER_SUBMITTER,
        "every submission must run exactly once"
    );
    manager.shutdown();
}
