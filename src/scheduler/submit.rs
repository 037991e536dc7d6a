// submit.rs — the shared submission surface.
//
// `Scheduler` is the handle everything holds onto: the manager that owns
// the worker threads, the workers themselves, every job handle, and every
// runnable (which receives it as its first argument, and may use it to
// submit and await further work). It is an `Arc` around the record pool,
// so clones are cheap and submission is possible from any thread.

use std::sync::Arc;

use crate::scheduler::core::{Core, Ticket};
use crate::scheduler::handle::{BlockedJobHandle, JobHandle};
use crate::scheduler::slot::{Arguments, Runnable};

/// Cloneable submission surface of one scheduler instance.
///
/// All submission calls may block on the free list when the record pool
/// is exhausted, and on the ready list when it is full; both bounds are
/// fixed at construction and sizing them for the workload is the
/// caller's responsibility.
#[derive(Clone)]
pub struct Scheduler {
    pub(crate) core: Arc<Core>,
}

impl Scheduler {
    pub(crate) fn from_core(core: Arc<Core>) -> Scheduler {
        Scheduler { core }
    }

    /// Submit a job with no antecedents; it becomes runnable immediately.
    ///
    /// A job with no runnable completes as soon as a worker picks it up,
    /// which makes it usable as a pure completion marker.
    pub fn insert_ready(&self, runnable: Option<Runnable>, args: Arguments) -> JobHandle {
        let id = self.core.free.pop();
        let xid = self.core.initialize_slot(id, runnable, 0, args);
        self.core.ready.enqueue(Some(id));
        JobHandle::new(Arc::clone(&self.core), id, xid)
    }

    /// Submit a batch of immediately runnable jobs and return a handle
    /// that completes only once every job in the batch has completed.
    ///
    /// The handle names an extra aggregator record that joins the fan-in;
    /// each submitted job notifies it on completion. `args` supplies the
    /// argument tuples: empty for none, one tuple shared by every job, or
    /// exactly one tuple per job.
    pub fn insert_ready_batch(&self, runnables: &[Runnable], args: &[Arguments]) -> JobHandle {
        let count = runnables.len();
        assert!(count > 0, "batch submission of zero jobs");

        // One extra record wraps the collection.
        let mut ids = vec![0u32; count + 1];
        self.core.free.pop_many(&mut ids);

        let aggregator = ids[count];
        let aggregator_xid =
            self.core
                .initialize_slot(aggregator, None, count, Arguments::default());

        for (index, &id) in ids[..count].iter().enumerate() {
            self.core
                .initialize_slot(id, Some(runnables[index]), 0, batch_args(args, count, index));
            // Both records are still exclusively ours; no lock needed.
            self.core.append_antecedent_unsynced(aggregator, id);
        }

        let tickets: Vec<Ticket> = ids[..count].iter().map(|&id| Some(id)).collect();
        self.core.ready.enqueue_many(&tickets);

        JobHandle::new(Arc::clone(&self.core), aggregator, aggregator_xid)
    }

    /// Submit a job parked behind a one-shot barrier. It does not run
    /// until the returned handle's barrier is released.
    pub fn insert_blocked(&self, runnable: Option<Runnable>, args: Arguments) -> BlockedJobHandle {
        let id = self.core.free.pop();
        let xid = self.core.initialize_slot(id, runnable, 1, args);
        BlockedJobHandle::new(JobHandle::new(Arc::clone(&self.core), id, xid))
    }

    /// Submit a batch of jobs parked behind one shared gate. Releasing
    /// the returned handle's barrier opens the gate for the whole batch.
    ///
    /// The gate is an aggregator record that is the sole antecedent of
    /// every job in the batch; note the completion of the returned handle
    /// therefore marks the gate opening, not the batch finishing. `args`
    /// follows the same empty/shared/per-job rule as
    /// [`insert_ready_batch`].
    ///
    /// [`insert_ready_batch`]: Scheduler::insert_ready_batch
    pub fn insert_blocked_batch(
        &self,
        runnables: &[Runnable],
        args: &[Arguments],
    ) -> BlockedJobHandle {
        let count = runnables.len();
        assert!(count > 0, "batch submission of zero jobs");

        let mut ids = vec![0u32; count + 1];
        self.core.free.pop_many(&mut ids);

        let gate = ids[count];
        let gate_xid = self
            .core
            .initialize_slot(gate, None, 1, Arguments::default());

        for (index, &id) in ids[..count].iter().enumerate() {
            self.core
                .initialize_slot(id, Some(runnables[index]), 1, batch_args(args, count, index));
            self.core.append_antecedent_unsynced(id, gate);
        }

        BlockedJobHandle::new(JobHandle::new(Arc::clone(&self.core), gate, gate_xid))
    }

    /// Submit a job that runs only after every handle in `antecedents`
    /// has completed. Antecedents that already completed are settled on
    /// the spot; with an empty list the job is immediately ready.
    pub fn insert_after(
        &self,
        runnable: Option<Runnable>,
        args: Arguments,
        antecedents: &[JobHandle],
    ) -> JobHandle {
        if antecedents.is_empty() {
            return self.insert_ready(runnable, args);
        }

        let id = self.core.free.pop();
        let xid = self
            .core
            .initialize_slot(id, runnable, antecedents.len(), args);
        let blocked = BlockedJobHandle::new(JobHandle::new(Arc::clone(&self.core), id, xid));

        let already_complete = self.core.append_antecedents(id, antecedents);
        if already_complete != 0 {
            blocked.release_barrier(already_complete);
        }

        blocked.into_handle()
    }
}

// Argument selection for batch submissions: none, one shared tuple, or
// one tuple per job.
fn batch_args(args: &[Arguments], count: usize, index: usize) -> Arguments {
    match args.len() {
        0 => Arguments::default(),
        1 => args[0],
        n => {
            assert_eq!(n, count, "batch argument count must be 0, 1, or the job count");
            args[index]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::core::Core;

    fn bare_scheduler() -> Scheduler {
        Scheduler::from_core(Arc::new(Core::new(16, 16)))
    }

    fn nop(_: &Scheduler, _: &Arguments) {}

    #[test]
    fn ready_submission_lands_on_the_ready_list() {
        let sched = bare_scheduler();
        let handle = sched.insert_ready(Some(nop), Arguments::default());
        assert!(!handle.is_done());
        assert_eq!(sched.core.ready.len(), 1);
    }

    #[test]
    fn blocked_submission_stays_parked() {
        let sched = bare_scheduler();
        let blocked = sched.insert_blocked(Some(nop), Arguments::default());
        assert!(sched.core.ready.is_empty());
        assert!(!blocked.is_done());
    }

    #[test]
    fn ready_batch_enqueues_children_only() {
        let sched = bare_scheduler();
        let runnables = [nop as Runnable, nop, nop];
        let handle = sched.insert_ready_batch(&runnables, &[]);

        // Three children queued; the aggregator waits off-queue for them.
        assert_eq!(sched.core.ready.len(), 3);
        assert_eq!(
            sched.core.slot(handle.slot_id).remaining.load(std::sync::atomic::Ordering::Relaxed),
            3
        );
    }

    #[test]
    fn blocked_batch_parks_everything_behind_the_gate() {
        let sched = bare_scheduler();
        let runnables = [nop as Runnable, nop];
        let gate = sched.insert_blocked_batch(&runnables, &[]);

        assert!(sched.core.ready.is_empty());
        // Opening the gate readies the gate record itself; the children
        // fan out when it runs.
        gate.release_barrier(1);
        assert_eq!(sched.core.ready.len(), 1);
    }

    #[test]
    #[should_panic(expected = "batch argument count")]
    fn mismatched_batch_arguments_are_fatal() {
        let sched = bare_scheduler();
        let runnables = [nop as Runnable, nop, nop];
        let args = [Arguments::default(), Arguments::default()];
        sched.insert_ready_batch(&runnables, &args);
    }
}
