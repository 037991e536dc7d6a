// slot.rs — the pool-resident job record.
//
// Records never move: the pool is one fixed array and everything else
// refers to a record by its index. A record's identity across reuse is
// its generation id (xid), assigned fresh at every initialization and
// stamped to the reserved done value when the job completes.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::scheduler::submit::Scheduler;

/// Argument tuple handed to every runnable, copied by value into the job
/// record at submission. Callers encode pointers, indices and small
/// integers into the four words; anything richer goes through one level
/// of indirection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Arguments {
    pub a0: usize,
    pub a1: usize,
    pub a2: usize,
    pub a3: usize,
}

impl Arguments {
    pub const fn new(a0: usize, a1: usize, a2: usize, a3: usize) -> Self {
        Arguments { a0, a1, a2, a3 }
    }
}

/// Job entry point. The scheduler reference lets a job submit and await
/// further work; the arguments are the tuple captured at submission.
///
/// Runnables must run to completion: there is no cancellation, and a
/// panicking runnable takes its worker thread down with it.
pub type Runnable = fn(&Scheduler, &Arguments);

/// Generation value a record carries once its runnable has returned and
/// post-processing has begun. The generation counter starts above this
/// value and only grows, so no live handle ever holds it.
pub(crate) const XID_DONE: u64 = 0;

/// Vacant successor-list entry.
pub(crate) const NO_SLOT: u32 = u32::MAX;

/// Inline successor capacity, tuned so the hot fields of a record stay
/// within one cache line's worth of pointer-sized words.
#[cfg(target_pointer_width = "32")]
pub(crate) const SUCC_SLOTS: usize = 5;
#[cfg(not(target_pointer_width = "32"))]
pub(crate) const SUCC_SLOTS: usize = 6;

/// The last inline slot is reserved: once the list saturates it holds the
/// index of a chained aggregator record instead of a plain successor.
pub(crate) const SUCC_USABLE: usize = SUCC_SLOTS - 1;

/// What the job actually does. Written while the record is exclusively
/// owned (freshly popped from the free list), read once when it runs, so
/// the mutex is never contended; it exists to make the hand-over between
/// submitter thread and worker thread explicit.
#[derive(Clone, Copy)]
pub(crate) struct Payload {
    pub(crate) runnable: Option<Runnable>,
    pub(crate) args: Arguments,
}

/// One fixed-size pool entry.
///
/// State machine: free-listed, initialized-and-parked (antecedents
/// outstanding), ready-listed, executing. Ownership is exclusive in each
/// state; the successor list is the one part that other threads touch,
/// and every write to it happens under the scheduler's shared graph
/// mutex.
pub(crate) struct JobSlot {
    /// Generation id. `XID_DONE` when complete; unique per initialization
    /// otherwise.
    pub(crate) xid: AtomicU64,
    /// Antecedents still outstanding. The 1 -> 0 transition is the enable
    /// edge and happens exactly once per initialization.
    pub(crate) remaining: AtomicUsize,
    pub(crate) payload: Mutex<Payload>,
    /// Guarded by the graph mutex for writes; read lock-free by the
    /// completing worker after the xid flip.
    pub(crate) succ_len: AtomicUsize,
    pub(crate) succ: [AtomicU32; SUCC_SLOTS],
}

impl JobSlot {
    pub(crate) fn new() -> Self {
        JobSlot {
            xid: AtomicU64::new(XID_DONE),
            remaining: AtomicUsize::new(0),
            payload: Mutex::new(Payload {
                runnable: None,
                args: Arguments::default(),
            }),
            succ_len: AtomicUsize::new(0),
            succ: std::array::from_fn(|_| AtomicU32::new(NO_SLOT)),
        }
    }

    /// Current generation, without any completion-ordering claim.
    pub(crate) fn current_xid(&self) -> u64 {
        self.xid.load(Ordering::Acquire)
    }
}
