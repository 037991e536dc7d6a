//! E2E Test Suite 02: Dependency Chains and Fan-Out
//!
//! Validates ordering through `insert_after`: linear chains, one
//! antecedent releasing many successors, already-completed antecedents,
//! and the empty dependency list.

use jobsched::{Arguments, JobHandle, Manager, Options, Scheduler};
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

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: Linear chain, each link reads its predecessor's output
// ─────────────────────────────────────────────────────────────────────────────

// a2 selects the slot to fill: slot[n] = slot[n-1] + 1 (slot[-1] taken
// as zero).
fn chain_step(_sched: &Scheduler, args: &Arguments) {
    let cells = cells_of(args);
    let index = args.a2;
    let previous = if index == 0 {
        0
    } else {
        cells[index - 1].load(Ordering::SeqCst)
    };
    cells[index].store(previous + 1, Ordering::SeqCst);
}

#[test]
fn linear_chain_orders_strictly() {
    let manager = manager(4, 16, 8);
    let cells = leak_cells(3);
    let base = cells.as_ptr() as usize;

    let a = manager.insert_ready(Some(chain_step), Arguments::new(base, 3, 0, 0));
    let b = manager.insert_after(Some(chain_step), Arguments::new(base, 3, 1, 0), &[a]);
    let c = manager.insert_after(Some(chain_step), Arguments::new(base, 3, 2, 0), &[b]);

    c.wait_on();
    assert_eq!(cells[0].load(Ordering::SeqCst), 1);
    assert_eq!(cells[1].load(Ordering::SeqCst), 2);
    assert_eq!(cells[2].load(Ordering::SeqCst), 3);
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: Fan-out, ten successors all observe the antecedent's write
// ─────────────────────────────────────────────────────────────────────────────

fn seed(_sched: &Scheduler, args: &Arguments) {
    cells_of(args)[0].store(args.a2, Ordering::SeqCst);
}

// Copy slot 0 into slot a2.
fn copy_seed(_sched: &Scheduler, args: &Arguments) {
    let cells = cells_of(args);
    let value = cells[0].load(Ordering::SeqCst);
    cells[args.a2].store(value, Ordering::SeqCst);
}

#[test]
fn fan_out_propagates_to_all_successors() {
    let manager = manager(4, 32, 16);
    let cells = leak_cells(11);
    let base = cells.as_ptr() as usize;

    let a = manager.insert_ready(Some(seed), Arguments::new(base, 11, 7777, 0));

    let successors: Vec<JobHandle> = (1..=10)
        .map(|slot| manager.insert_after(Some(copy_seed), Arguments::new(base, 11, slot, 0), &[a.clone()]))
        .collect();

    for successor in &successors {
        successor.wait_on();
    }
    for slot in 1..=10 {
        assert_eq!(
            cells[slot].load(Ordering::SeqCst),
            7777,
            "successor {slot} must observe the antecedent's write"
        );
    }
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: Antecedents that already completed are settled on the spot
// ─────────────────────────────────────────────────────────────────────────────

fn bump(_sched: &Scheduler, args: &Arguments) {
    cells_of(args)[0].fetch_add(1, Ordering::SeqCst);
}

#[test]
fn completed_antecedents_do_not_park_the_job() {
    let manager = manager(2, 16, 8);
    let cells = leak_cells(1);
    let args = Arguments::new(cells.as_ptr() as usize, 1, 0, 0);

    let a = manager.insert_ready(Some(bump), args);
    let b = manager.insert_ready(Some(bump), args);
    a.wait_on();
    b.wait_on();

    // Both antecedents are long gone; the successor must still run.
    let c = manager.insert_after(Some(bump), args, &[a, b]);
    c.wait_on();
    assert_eq!(cells[0].load(Ordering::SeqCst), 3);
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: Mixed live and completed antecedents
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn mixed_antecedents_all_count() {
    let manager = manager(4, 16, 8);
    let cells = leak_cells(1);
    let args = Arguments::new(cells.as_ptr() as usize, 1, 0, 0);

    let done = manager.insert_ready(Some(bump), args);
    done.wait_on();

    // A gate keeps the second antecedent alive until after submission.
    let parked = manager.insert_blocked(Some(bump), args);
    let tail = manager.insert_after(Some(bump), args, &[done, parked.handle().clone()]);

    assert!(!tail.is_done());
    parked.release_barrier(1);
    tail.wait_on();
    assert_eq!(cells[0].load(Ordering::SeqCst), 3);
    manager.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: Empty dependency list means immediately ready
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn no_antecedents_runs_immediately() {
    let manager = manager(2, 8, 4);
    let cells = leak_cells(1);
    let args = Arguments::new(cells.as_ptr() as usize, 1, 0, 0);

    let handle = manager.insert_after(Some(bump), args, &[]);
    handle.wait_on();
    assert_eq!(cells[0].load(Ordering::SeqCst), 1);
    manager.shutdown();
}
