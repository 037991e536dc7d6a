// core.rs — record operations over the shared pool.
//
// Dependencies are maintained forward: when a job finishes it decrements
// each downstream record's antecedent count and readies the ones that
// reach zero. Timing hazards are contained by three mechanisms:
//
// + ready list / free list: thread safety owned by the bounded containers.
// + one shared graph mutex per scheduler: serializes every successor-list
//   append, the completion xid flip, and the append-vs-completed race.
//   It is held only for list surgery and the flip itself, never across
//   runnable execution, so contention stays small.
// + the antecedent counter: lock-free CAS, since it is the hot path of
//   every fan-in edge.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};

use crate::scheduler::handle::JobHandle;
use crate::scheduler::slot::{
    Arguments, JobSlot, Payload, Runnable, NO_SLOT, SUCC_SLOTS, SUCC_USABLE, XID_DONE,
};
use crate::scheduler::submit::Scheduler;
use crate::sync::{BlockingQueue, BlockingStack};

/// Ready-list entry. `None` is the shutdown sentinel workers exit on.
pub(crate) type Ticket = Option<u32>;

/// Shared scheduler state: the record pool and everything the records
/// refer to. One `Core` per manager; workers, handles and the submission
/// surface all hold it through an `Arc`.
pub(crate) struct Core {
    slots: Box<[JobSlot]>,
    pub(crate) ready: BlockingQueue<Ticket>,
    pub(crate) free: BlockingStack<u32>,
    /// Graph mutex. See the module header for what it covers.
    graph: Mutex<()>,
    /// Broadcast after every completion; paired with `graph`.
    completed: Condvar,
    /// Generation source. Starts at zero and is incremented before use,
    /// so the reserved done value is never handed out.
    next_xid: AtomicU64,
    pub(crate) quitting: AtomicBool,
}

impl Core {
    pub(crate) fn new(pool_size: usize, ready_size: usize) -> Core {
        // Record indices travel as u32; the top value marks vacancy.
        assert!(
            pool_size < NO_SLOT as usize,
            "job pool size does not fit the record index range"
        );
        let core = Core {
            slots: (0..pool_size).map(|_| JobSlot::new()).collect(),
            ready: BlockingQueue::new(ready_size),
            free: BlockingStack::new(pool_size),
            graph: Mutex::new(()),
            completed: Condvar::new(),
            next_xid: AtomicU64::new(XID_DONE),
            quitting: AtomicBool::new(false),
        };
        let all: Vec<u32> = (0..pool_size as u32).collect();
        core.free.push_many(&all);
        core
    }

    pub(crate) fn slot(&self, id: u32) -> &JobSlot {
        &self.slots[id as usize]
    }

    // ---------------------------------------------------------------------
    // Initialization and release
    // ---------------------------------------------------------------------

    /// Set up a freshly popped record and stamp it with a new generation.
    /// The caller owns the record exclusively until it is enqueued or
    /// linked into the graph.
    pub(crate) fn initialize_slot(
        &self,
        id: u32,
        runnable: Option<Runnable>,
        antecedent_count: usize,
        args: Arguments,
    ) -> u64 {
        let slot = self.slot(id);
        slot.remaining.store(antecedent_count, Ordering::Relaxed);
        let xid = self.next_xid.fetch_add(1, Ordering::Relaxed) + 1;
        slot.xid.store(xid, Ordering::Release);
        slot.succ_len.store(0, Ordering::Relaxed);
        for entry in &slot.succ {
            entry.store(NO_SLOT, Ordering::Relaxed);
        }
        *slot.payload.lock().unwrap() = Payload { runnable, args };
        xid
    }

    /// Return a completed record to the free list.
    fn release_slot(&self, id: u32) {
        debug_assert_eq!(self.slot(id).xid.load(Ordering::Acquire), XID_DONE);
        self.free.push(id);
    }

    // ---------------------------------------------------------------------
    // Completion queries
    // ---------------------------------------------------------------------

    /// A record is complete for a given handle generation once its xid has
    /// moved on. The xid is invalidated after the runnable returns, so a
    /// `true` answer carries happens-before with everything the job wrote.
    pub(crate) fn is_complete(&self, id: u32, xid: u64) -> bool {
        self.slot(id).current_xid() != xid
    }

    /// Park until the generation is invalidated. Wakeups are re-checked:
    /// the completion broadcast is shared by all waiters and the condvar
    /// may also wake spuriously.
    pub(crate) fn wait_on(&self, id: u32, xid: u64) {
        let mut graph = self.graph.lock().unwrap();
        while !self.is_complete(id, xid) {
            graph = self.completed.wait(graph).unwrap();
        }
    }

    // ---------------------------------------------------------------------
    // Notification
    // ---------------------------------------------------------------------

    /// Deliver one antecedent completion. The thread that wins the final
    /// decrement enqueues the record on the ready list.
    pub(crate) fn notify(&self, id: u32) {
        if self.notify_inner(id) {
            self.ready.enqueue(Some(id));
        }
    }

    /// Like [`notify`], but on the enable edge the record is handed back
    /// to the caller instead of enqueued, so a completing worker can run
    /// it directly and follow the dependency chain.
    ///
    /// [`notify`]: Core::notify
    pub(crate) fn notify_return_on_enabled(&self, id: u32) -> Option<u32> {
        if self.notify_inner(id) {
            Some(id)
        } else {
            None
        }
    }

    // True exactly when this call produced the 1 -> 0 transition.
    fn notify_inner(&self, id: u32) -> bool {
        let slot = self.slot(id);
        let mut current = slot.remaining.load(Ordering::Acquire);
        loop {
            assert!(current > 0, "job record has an invalid antecedent count");
            if current == 1 {
                // No contention is possible here: the enable edge is
                // delivered by exactly one notifier per initialization.
                slot.remaining.store(0, Ordering::Release);
                return true;
            }
            match slot.remaining.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return false,
                Err(observed) => current = observed,
            }
        }
    }

    /// Raise the antecedent count by `count` without taking any lock. Used
    /// by blocked handles; the count must still be nonzero, which the
    /// handle's live generation guarantees.
    pub(crate) fn append_barrier(&self, id: u32, count: usize) {
        self.slot(id).remaining.fetch_add(count, Ordering::AcqRel);
    }

    // ---------------------------------------------------------------------
    // Successor-list construction
    // ---------------------------------------------------------------------

    /// Make `target` wait on `source`. If `source` already completed (its
    /// generation moved past `source_xid`) the notification is delivered
    /// immediately instead; the graph mutex serializes that decision
    /// against the completion flip.
    pub(crate) fn append_antecedent(&self, target: u32, source: u32, source_xid: u64) {
        let appended = {
            let _graph = self.graph.lock().unwrap();
            if self.is_complete(source, source_xid) {
                false
            } else {
                self.add_successor_locked(source, target);
                true
            }
        };
        if !appended {
            self.notify(target);
        }
    }

    /// Make `target` wait on every handle in `antecedents`, under a single
    /// lock acquisition. Returns how many were already complete; the
    /// caller settles those with a matching barrier release.
    pub(crate) fn append_antecedents(&self, target: u32, antecedents: &[JobHandle]) -> usize {
        let mut already_complete = 0;
        let _graph = self.graph.lock().unwrap();
        for antecedent in antecedents {
            debug_assert!(
                std::ptr::eq(&*antecedent.core, self),
                "antecedent handle belongs to a different scheduler"
            );
            if self.is_complete(antecedent.slot_id, antecedent.xid) {
                already_complete += 1;
            } else {
                self.add_successor_locked(antecedent.slot_id, target);
            }
        }
        already_complete
    }

    /// Submission-time variant: both records are freshly popped from the
    /// free list and not yet observable by any other thread, so the graph
    /// mutex can be skipped.
    pub(crate) fn append_antecedent_unsynced(&self, target: u32, source: u32) {
        self.add_successor_locked(source, target);
    }

    // Insert `notifies` into `source`'s successor list. Caller must hold
    // the graph mutex (or own both records exclusively).
    //
    // The list saturates at SUCC_USABLE entries; the reserved final slot
    // then chains to an aggregator record with a single antecedent and no
    // runnable, whose own list continues the chain. Completion notifies
    // the aggregator like any successor, and the aggregator's run fans
    // out to the entries parked behind it. Chaining this way is unbounded.
    fn add_successor_locked(&self, source: u32, notifies: u32) {
        let slot = self.slot(source);
        let len = slot.succ_len.load(Ordering::Relaxed);

        if len < SUCC_USABLE {
            assert_ne!(notifies, source, "job record cannot succeed itself");
            slot.succ[len].store(notifies, Ordering::Relaxed);
            slot.succ_len.store(len + 1, Ordering::Release);
        } else if len == SUCC_USABLE {
            slot.succ_len.store(len + 1, Ordering::Release);

            // The chained record is not linked in yet and is not in
            // contention, so it can be populated directly.
            let chained = self.free.pop();
            self.initialize_slot(chained, None, 1, Arguments::default());
            let chained_slot = self.slot(chained);
            chained_slot.succ_len.store(1, Ordering::Relaxed);
            chained_slot.succ[0].store(notifies, Ordering::Relaxed);

            slot.succ[SUCC_USABLE].store(chained, Ordering::Relaxed);
        } else {
            // Saturated: descend into the chain.
            let chained = slot.succ[SUCC_USABLE].load(Ordering::Relaxed);
            self.add_successor_locked(chained, notifies);
        }
    }

    // ---------------------------------------------------------------------
    // Execution
    // ---------------------------------------------------------------------

    /// Run an enabled record to completion and post-process it. Returns
    /// the index of a successor this completion enabled, if any, so the
    /// calling worker can execute it without a ready-list round trip.
    pub(crate) fn run_slot(&self, sched: &Scheduler, id: u32) -> Option<u32> {
        let slot = self.slot(id);
        assert_eq!(
            slot.remaining.load(Ordering::Acquire),
            0,
            "job record ran with antecedents outstanding"
        );
        assert_ne!(
            slot.current_xid(),
            XID_DONE,
            "job record ran after completing"
        );

        let Payload { runnable, args } = *slot.payload.lock().unwrap();
        if let Some(run) = runnable {
            run(sched, &args);
        }

        // Invalidating the xid under the graph mutex publishes completion:
        // from here on would-be appenders observe the record as complete
        // and notify themselves directly.
        {
            let _graph = self.graph.lock().unwrap();
            slot.xid.store(XID_DONE, Ordering::Release);
        }
        self.completed.notify_all();

        // The successor list is now stable and can be walked without the
        // lock. The first successor this completion enables is handed to
        // the caller; it is probably related work, and running it on the
        // same thread keeps the chain's data warm.
        let len = slot.succ_len.load(Ordering::Acquire);
        assert!(len <= SUCC_SLOTS, "successor list count out of range");

        let mut enabled = None;
        let mut index = 0;
        while index < len {
            let successor = slot.succ[index].load(Ordering::Acquire);
            index += 1;
            enabled = self.notify_return_on_enabled(successor);
            if enabled.is_some() {
                break;
            }
        }
        for rest in index..len {
            self.notify(slot.succ[rest].load(Ordering::Acquire));
        }

        self.release_slot(id);
        enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_core() -> Core {
        Core::new(32, 16)
    }

    #[test]
    fn generations_are_unique_and_monotonic() {
        let core = test_core();
        let a = core.free.pop();
        let b = core.free.pop();

        let xid_a = core.initialize_slot(a, None, 0, Arguments::default());
        let xid_b = core.initialize_slot(b, None, 0, Arguments::default());
        assert_ne!(xid_a, XID_DONE);
        assert!(xid_b > xid_a);

        // Reinitializing the same record never reuses a generation.
        let xid_a2 = core.initialize_slot(a, None, 0, Arguments::default());
        assert!(xid_a2 > xid_b);
    }

    #[test]
    fn inline_successors_fill_in_order() {
        let core = test_core();
        let source = core.free.pop();
        core.initialize_slot(source, None, 1, Arguments::default());

        let mut successors = Vec::new();
        for _ in 0..SUCC_USABLE {
            let s = core.free.pop();
            core.initialize_slot(s, None, 1, Arguments::default());
            core.append_antecedent_unsynced(s, source);
            successors.push(s);
        }

        let slot = core.slot(source);
        assert_eq!(slot.succ_len.load(Ordering::Relaxed), SUCC_USABLE);
        for (i, &s) in successors.iter().enumerate() {
            assert_eq!(slot.succ[i].load(Ordering::Relaxed), s);
        }
        assert_eq!(slot.succ[SUCC_USABLE].load(Ordering::Relaxed), NO_SLOT);
    }

    #[test]
    fn saturated_list_chains_an_aggregator() {
        let core = test_core();
        let free_before = core.free.len();
        let source = core.free.pop();
        core.initialize_slot(source, None, 1, Arguments::default());

        let extra = 3;
        for _ in 0..SUCC_USABLE + extra {
            let s = core.free.pop();
            core.initialize_slot(s, None, 1, Arguments::default());
            core.append_antecedent_unsynced(s, source);
        }

        let slot = core.slot(source);
        assert_eq!(slot.succ_len.load(Ordering::Relaxed), SUCC_SLOTS);

        // The reserved slot now names a chained aggregator holding the
        // overflow entries: one antecedent, no runnable of its own.
        let chained = slot.succ[SUCC_USABLE].load(Ordering::Relaxed);
        assert_ne!(chained, NO_SLOT);
        let chained_slot = core.slot(chained);
        assert_eq!(chained_slot.remaining.load(Ordering::Relaxed), 1);
        // The sixth append created the chain; the rest landed in it.
        assert_eq!(chained_slot.succ_len.load(Ordering::Relaxed), extra);

        // One record was drawn from the pool for the chain.
        assert_eq!(core.free.len(), free_before - 1 - (SUCC_USABLE + extra) - 1);
    }

    #[test]
    fn append_to_completed_source_notifies_directly() {
        let core = test_core();
        let source = core.free.pop();
        let source_xid = core.initialize_slot(source, None, 0, Arguments::default());
        // Complete the source by hand: invalidate its generation.
        core.slot(source).xid.store(XID_DONE, Ordering::Release);

        let target = core.free.pop();
        core.initialize_slot(target, None, 1, Arguments::default());
        core.append_antecedent(target, source, source_xid);

        // The decrement landed and the target went straight to ready.
        assert_eq!(core.slot(target).remaining.load(Ordering::Relaxed), 0);
        assert_eq!(core.ready.dequeue(), Some(target));
        assert_eq!(core.slot(source).succ_len.load(Ordering::Relaxed), 0);
    }

    #[test]
    #[should_panic(expected = "invalid antecedent count")]
    fn notify_underflow_is_fatal() {
        let core = test_core();
        let id = core.free.pop();
        core.initialize_slot(id, None, 0, Arguments::default());
        core.notify(id);
    }
}
