// worker.rs — the worker thread body.

use log::{debug, trace};
use std::sync::atomic::Ordering;

use crate::scheduler::submit::Scheduler;

/// Dequeue, run, repeat. When a completed job enables exactly one
/// follow-up, run it directly instead of round-tripping through the
/// ready list; dependency chains then stay on one thread.
pub(crate) fn worker_main(sched: Scheduler, index: usize) {
    let mut jobs_run: u64 = 0;

    loop {
        match sched.core.ready.dequeue() {
            Some(id) => {
                let mut next = Some(id);
                while let Some(current) = next {
                    trace!("worker {index}: running record {current}");
                    next = sched.core.run_slot(&sched, current);
                    jobs_run += 1;
                }
            }
            None => {
                // Sentinels are only ever enqueued by shutdown.
                assert!(
                    sched.core.quitting.load(Ordering::Acquire),
                    "ready list produced a stray shutdown sentinel"
                );
                break;
            }
        }
    }

    debug!("worker {index}: exiting after {jobs_run} jobs");
}
