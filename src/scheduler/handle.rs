// handle.rs — caller-facing job identities.
//
// A handle is a (generation, record) pair. The record index stays valid
// for the life of the scheduler, and the generation tells a live record
// apart from a reused one, so completion can be tested without reference
// counting.

use std::fmt;
use std::sync::Arc;

use crate::scheduler::core::Core;
use crate::scheduler::slot::{Arguments, Runnable};
use crate::scheduler::submit::Scheduler;

/// Handle to a submitted job.
///
/// Cheap to clone; clones observe the same job. Once the job completes,
/// the handle stays safe to query: `is_done` keeps answering `true` and
/// `wait_on` returns immediately, even after the underlying record has
/// been recycled for another job.
#[derive(Clone)]
pub struct JobHandle {
    pub(crate) core: Arc<Core>,
    pub(crate) slot_id: u32,
    pub(crate) xid: u64,
}

impl JobHandle {
    pub(crate) fn new(core: Arc<Core>, slot_id: u32, xid: u64) -> JobHandle {
        JobHandle { core, slot_id, xid }
    }

    /// Non-blocking completion test. `true` once the runnable has
    /// returned, with happens-before ordering against its writes.
    pub fn is_done(&self) -> bool {
        self.core.is_complete(self.slot_id, self.xid)
    }

    /// Block the calling thread until the job completes. Returns
    /// immediately when it already has.
    pub fn wait_on(&self) {
        self.core.wait_on(self.slot_id, self.xid);
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("slot", &self.slot_id)
            .field("xid", &self.xid)
            .finish()
    }
}

/// Handle to a job parked behind a barrier the caller must release.
///
/// The job carries one artificial antecedent from submission. It runs
/// once `release_barrier` has settled that count, or once a scheduled
/// releaser (see [`add_barrier`]) has run.
///
/// [`add_barrier`]: BlockedJobHandle::add_barrier
#[derive(Clone)]
pub struct BlockedJobHandle {
    handle: JobHandle,
}

/// Sanity signature carried in a releaser's argument tuple.
pub(crate) const RELEASER_CHECK_WORD: usize = 0x9719_661d;

impl BlockedJobHandle {
    pub(crate) fn new(handle: JobHandle) -> BlockedJobHandle {
        BlockedJobHandle { handle }
    }

    /// The plain handle for completion queries.
    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    /// Discard the barrier obligation tracking and keep the plain handle.
    pub fn into_handle(self) -> JobHandle {
        self.handle
    }

    /// See [`JobHandle::is_done`].
    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }

    /// See [`JobHandle::wait_on`].
    pub fn wait_on(&self) {
        self.handle.wait_on()
    }

    /// Raise the barrier by `count` and prepare a releaser that settles
    /// one count when run. The invocation spec written into `args` names
    /// the record, a fixed check word, and the two halves of the current
    /// generation for verification; schedule the returned runnable with
    /// those arguments like any other job. Callers wanting all `count`
    /// releases delivered this way schedule `count` releasers.
    pub fn add_barrier(&self, args: &mut Arguments, count: usize) -> Runnable {
        args.a0 = self.handle.slot_id as usize;
        args.a1 = RELEASER_CHECK_WORD;

        let xid = self.handle.core.slot(self.handle.slot_id).current_xid();
        self.handle.core.append_barrier(self.handle.slot_id, count);
        args.a2 = ((xid >> 32) as usize) & 0xffff_ffff;
        args.a3 = (xid as usize) & 0xffff_ffff;
        barrier_releaser
    }

    /// Settle `count` barrier releases directly. The job must not have
    /// completed yet; call sites own that knowledge by construction.
    pub fn release_barrier(&self, count: usize) {
        assert_eq!(
            self.handle.core.slot(self.handle.slot_id).current_xid(),
            self.handle.xid,
            "barrier released on a completed job"
        );
        for _ in 0..count {
            self.handle.core.notify(self.handle.slot_id);
        }
    }
}

impl fmt::Debug for BlockedJobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockedJobHandle")
            .field("slot", &self.handle.slot_id)
            .field("xid", &self.handle.xid)
            .finish()
    }
}

/// Built-in runnable that settles one barrier release. Verifies the check
/// word and the generation halves before notifying, so a stale or
/// corrupted invocation spec halts instead of poking a recycled record.
pub(crate) fn barrier_releaser(sched: &Scheduler, args: &Arguments) {
    let slot_id = args.a0 as u32;
    assert_eq!(
        args.a1, RELEASER_CHECK_WORD,
        "barrier releaser arguments corrupted"
    );

    let xid = sched.core.slot(slot_id).current_xid();
    assert_eq!(
        args.a2,
        ((xid >> 32) as usize) & 0xffff_ffff,
        "barrier releaser generation mismatch"
    );
    assert_eq!(
        args.a3,
        (xid as usize) & 0xffff_ffff,
        "barrier releaser generation mismatch"
    );

    sched.core.notify(slot_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::slot::Arguments;

    fn bare_scheduler() -> Scheduler {
        Scheduler::from_core(Arc::new(Core::new(8, 8)))
    }

    #[test]
    fn releaser_settles_one_count() {
        let sched = bare_scheduler();
        let id = sched.core.free.pop();
        let xid = sched.core.initialize_slot(id, None, 1, Arguments::default());
        let blocked = BlockedJobHandle::new(JobHandle::new(Arc::clone(&sched.core), id, xid));

        let mut args = Arguments::default();
        let releaser = blocked.add_barrier(&mut args, 1);
        assert_eq!(sched.core.slot(id).remaining.load(std::sync::atomic::Ordering::Relaxed), 2);

        releaser(&sched, &args);
        assert_eq!(sched.core.slot(id).remaining.load(std::sync::atomic::Ordering::Relaxed), 1);

        blocked.release_barrier(1);
        // The record reached its enable edge and went to the ready list.
        assert_eq!(sched.core.ready.dequeue(), Some(id));
    }

    #[test]
    #[should_panic(expected = "arguments corrupted")]
    fn releaser_rejects_bad_check_word() {
        let sched = bare_scheduler();
        let id = sched.core.free.pop();
        let xid = sched.core.initialize_slot(id, None, 1, Arguments::default());
        let blocked = BlockedJobHandle::new(JobHandle::new(Arc::clone(&sched.core), id, xid));

        let mut args = Arguments::default();
        let releaser = blocked.add_barrier(&mut args, 1);
        args.a1 = 0xbad;
        releaser(&sched, &args);
    }

    #[test]
    #[should_panic(expected = "generation mismatch")]
    fn releaser_rejects_stale_generation() {
        let sched = bare_scheduler();
        let id = sched.core.free.pop();
        let xid = sched.core.initialize_slot(id, None, 1, Arguments::default());
        let blocked = BlockedJobHandle::new(JobHandle::new(Arc::clone(&sched.core), id, xid));

        let mut args = Arguments::default();
        let releaser = blocked.add_barrier(&mut args, 1);
        // Recycle the record before the releaser runs.
        sched.core.initialize_slot(id, None, 1, Arguments::default());
        releaser(&sched, &args);
    }
}
