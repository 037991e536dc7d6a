//! E2E Test Suite 01: Single Job
//!
//! Validates the basic submit / run / observe / wait cycle on a live
//! worker pool, plus completion observability and pool conservation at
//! shutdown.

use jobsched::{Arguments, Manager, Options, Scheduler};
use std::sync::atomic::{AtomicUsize, Ordering};

fn manager(num_threads: usize, free_list_size: usize, ready_list_size: usize) -> Manager {
    let _ = env_logger::builder().is_test(true).try_init();
    Manager::new(Options {
        num_threads,
        free_list_size,
        ready_list_size,
    })
    .expect("manager construction must succeed")
}

/// Fresh shared cells with static lifetime, addressable through the
/// argument words.
fn leak_cells(count: usize) -> &'static [AtomicUsize] {
    Box::leak(
        (0..count)
            .map(|_| AtomicUsize::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice(),
    )
}

fn cells_of(args: &Arguments) -> &'static [AtomicUsize] {
    // a0 carries the base address, a1 the element count.
    unsafe { std::slice::from_raw_parts(args.a0 as *const AtomicUsize, args.a1) }
}

fn cell_args(cells: &'static [AtomicUsize]) -> Arguments {
    Arguments::new(cells.as_ptr() as usize, cells.len(), 0, 0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: One job writes one value; the waiter observes it
// ─────────────────────────────────────────────────────────────────────────────

fn write_42(_sched: &Scheduler, args: &Arguments) {
    cells_of(args)[0].store(42, Ordering::SeqCst);
}

#[test]
fn single_job_runs_and_completes() {
    let manager = manager(4, 16, 8);
    let cells = leak_cells(1);

    let handle = manager.insert_ready(Some(write_42), cell_args(cells));
    handle.wait_on();

    assert_eq!(cells[0].load(Ordering::SeqCst), 42);
    assert!(handle.is_done());
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: is_done flips exactly at completion
// ─────────────────────────────────────────────────────────────────────────────

fn bump(_sched: &Scheduler, args: &Arguments) {
    cells_of(args)[0].fetch_add(1, Ordering::SeqCst);
}

#[test]
fn completion_is_observable() {
    let manager = manager(2, 8, 4);
    let cells = leak_cells(1);

    // A parked job is definitely not done yet.
    let blocked = manager.insert_blocked(Some(bump), cell_args(cells));
    assert!(!blocked.is_done());
    assert_eq!(cells[0].load(Ordering::SeqCst), 0);

    blocked.release_barrier(1);
    blocked.wait_on();

    assert!(blocked.is_done());
    assert_eq!(cells[0].load(Ordering::SeqCst), 1);
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: Waiting on a completed handle returns immediately
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn wait_on_completed_handle_is_a_no_op() {
    let manager = manager(2, 8, 4);
    let cells = leak_cells(1);

    let handle = manager.insert_ready(Some(bump), cell_args(cells));
    handle.wait_on();
    // Second and third waits must not block.
    handle.wait_on();
    handle.wait_on();

    assert_eq!(cells[0].load(Ordering::SeqCst), 1);
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: A runnable-less job acts as a completion marker
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn empty_job_completes() {
    let manager = manager(2, 8, 4);
    let handle = manager.insert_ready(None, Arguments::default());
    handle.wait_on();
    assert!(handle.is_done());
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: Every record returns to the pool before shutdown
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn pool_is_conserved_across_many_submissions() {
    let manager = manager(4, 16, 8);
    let cells = leak_cells(1);

    // Far more jobs than pool entries, so each record is recycled many
    // times over.
    for _ in 0..500 {
        manager.insert_ready(Some(bump), cell_args(cells)).wait_on();
    }

    assert_eq!(cells[0].load(Ordering::SeqCst), 500);
    // Shutdown halts internally if any record failed to come home.
    manager.shutdown();
}
