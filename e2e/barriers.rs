//! E2E Test Suite 04: Blocked Handles and Barrier Release
//!
//! Validates the gate protocol: direct release from another job's
//! runnable, releasers scheduled as ordinary dependencies, and stacked
//! barrier counts.

use jobsched::{Arguments, BlockedJobHandle, Manager, Options, Scheduler};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

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

// Stamp this job's sequence number into slot a2. Slot 0 is the shared
// sequence counter, so stamps start at 1.
fn stamp(_sched: &Scheduler, args: &Arguments) {
    let cells = cells_of(args);
    let order = cells[0].fetch_add(1, Ordering::SeqCst) + 1;
    cells[args.a2].store(order, Ordering::SeqCst);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: A running job opens another job's gate
// ─────────────────────────────────────────────────────────────────────────────

// Stamp like `stamp`, then release the gate whose leaked handle rides
// in a3.
fn stamp_then_release(sched: &Scheduler, args: &Arguments) {
    stamp(sched, args);
    let gate = unsafe { &*(args.a3 as *const BlockedJobHandle) };
    gate.release_barrier(1);
}

#[test]
fn release_from_a_runnable_orders_the_pair() {
    let manager = manager(4, 16, 8);
    let cells = leak_cells(3);
    let base = cells.as_ptr() as usize;

    // B is parked; its stamp goes to slot 2.
    let gate = manager.insert_blocked(Some(stamp), Arguments::new(base, 3, 2, 0));
    let gate_ref: &'static BlockedJobHandle = Box::leak(Box::new(gate.clone()));

    // A stamps slot 1 and then opens B's gate.
    manager.insert_ready(
        Some(stamp_then_release),
        Arguments::new(base, 3, 1, gate_ref as *const _ as usize),
    );

    gate.wait_on();
    let a_stamp = cells[1].load(Ordering::SeqCst);
    let b_stamp = cells[2].load(Ordering::SeqCst);
    assert!(a_stamp >= 1, "releasing job never ran");
    assert!(b_stamp > a_stamp, "gated job ran before its releaser");
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: A prepared releaser scheduled as an ordinary dependency
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn releaser_runs_as_a_dependency() {
    let manager = manager(4, 16, 8);
    let cells = leak_cells(3);
    let base = cells.as_ptr() as usize;

    let gate = manager.insert_blocked(Some(stamp), Arguments::new(base, 3, 2, 0));

    // The releaser raises the barrier by one and settles it when run; the
    // original submission count is settled directly.
    let mut releaser_args = Arguments::default();
    let releaser = gate.add_barrier(&mut releaser_args, 1);
    gate.release_barrier(1);

    // Gate still closed: the added barrier count is outstanding.
    std::thread::sleep(Duration::from_millis(50));
    assert!(!gate.is_done());

    // Chain: A stamps slot 1, then the releaser runs, then B.
    let a = manager.insert_ready(Some(stamp), Arguments::new(base, 3, 1, 0));
    manager.insert_after(Some(releaser), releaser_args, &[a]);

    gate.wait_on();
    let a_stamp = cells[1].load(Ordering::SeqCst);
    let b_stamp = cells[2].load(Ordering::SeqCst);
    assert!(b_stamp > a_stamp, "gated job ran before its releaser's antecedent");
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: Stacked barriers all have to settle
// ─────────────────────────────────────────────────────────────────────────────

fn bump(_sched: &Scheduler, args: &Arguments) {
    cells_of(args)[0].fetch_add(1, Ordering::SeqCst);
}

#[test]
fn every_stacked_barrier_must_release() {
    let manager = manager(4, 16, 8);
    let cells = leak_cells(1);

    let gate = manager.insert_blocked(Some(bump), Arguments::new(cells.as_ptr() as usize, 1, 0, 0));

    // Two extra releasers on top of the submission barrier.
    let mut first_args = Arguments::default();
    let first = gate.add_barrier(&mut first_args, 1);
    let mut second_args = Arguments::default();
    let second = gate.add_barrier(&mut second_args, 1);

    manager.insert_ready(Some(first), first_args);
    manager.insert_ready(Some(second), second_args);
    std::thread::sleep(Duration::from_millis(50));
    assert!(
        !gate.is_done(),
        "job ran with the submission barrier still held"
    );

    gate.release_barrier(1);
    gate.wait_on();
    assert_eq!(cells[0].load(Ordering::SeqCst), 1, "job must run exactly once");
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: Multi-count direct release
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn direct_release_settles_multiple_counts() {
    let manager = manager(2, 8, 4);
    let cells = leak_cells(1);

    let gate = manager.insert_blocked(Some(bump), Arguments::new(cells.as_ptr() as usize, 1, 0, 0));
    let mut unused = Arguments::default();
    // Raise by two without scheduling the releaser; settle everything in
    // one direct call.
    let _ = gate.add_barrier(&mut unused, 2);

    gate.release_barrier(3);
    gate.wait_on();
    assert_eq!(cells[0].load(Ordering::SeqCst), 1);
    manager.shutdown();
}
