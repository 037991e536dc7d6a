// manager.rs — scheduler lifecycle.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::scheduler::core::Core;
use crate::scheduler::handle::{BlockedJobHandle, JobHandle};
use crate::scheduler::slot::{Arguments, Runnable};
use crate::scheduler::submit::Scheduler;

/// Construction options for [`Manager`].
///
/// `free_list_size` bounds the number of outstanding jobs (submission
/// blocks when the pool is exhausted) and `ready_list_size` bounds the
/// enabled-but-unclaimed burst (enqueueing blocks at capacity). Neither
/// bound grows after construction.
#[derive(Clone, Copy, Debug)]
pub struct Options {
    pub num_threads: usize,
    pub free_list_size: usize,
    pub ready_list_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            num_threads: num_cpus::get(),
            free_list_size: 256,
            ready_list_size: 128,
        }
    }
}

/// Owns one scheduler instance: the record pool, the ready and free
/// lists, and the worker threads. Dropping the manager shuts the
/// instance down; by that point every submitted job must have completed,
/// or teardown halts on the pool-conservation check.
pub struct Manager {
    scheduler: Scheduler,
    workers: Vec<JoinHandle<()>>,
    options: Options,
}

impl Manager {
    /// Allocate the pool, populate the free list, and start the workers.
    ///
    /// Returns `None` when the options are degenerate (a zero count
    /// anywhere) or a worker thread cannot be spawned.
    pub fn new(options: Options) -> Option<Manager> {
        if options.num_threads < 1 || options.free_list_size < 1 || options.ready_list_size < 1 {
            return None;
        }

        let core = Arc::new(Core::new(options.free_list_size, options.ready_list_size));
        let scheduler = Scheduler::from_core(core);

        let mut workers = Vec::with_capacity(options.num_threads);
        for index in 0..options.num_threads {
            let sched = scheduler.clone();
            let worker = thread::Builder::new()
                .name(format!("jobsched-worker-{index}"))
                .spawn(move || crate::scheduler::worker::worker_main(sched, index))
                .ok()?;
            workers.push(worker);
        }

        Some(Manager {
            scheduler,
            workers,
            options,
        })
    }

    /// The shared submission surface. Clone it freely into other threads;
    /// it stays valid until shutdown.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Stop the workers and tear the instance down. Jobs already on the
    /// ready list still run: the shutdown sentinels queue behind them.
    /// Halts if any record has not returned to the free list, which means
    /// a parked job was never released or a handle was never awaited.
    pub fn shutdown(mut self) {
        self.shutdown_in_place();
    }

    fn shutdown_in_place(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        let core = &self.scheduler.core;
        core.quitting.store(true, Ordering::Release);

        // One sentinel per worker; each consumes exactly one and exits.
        for _ in 0..self.workers.len() {
            core.ready.enqueue(None);
        }
        for worker in self.workers.drain(..) {
            worker.join().unwrap();
        }

        assert_eq!(
            core.free.len(),
            self.options.free_list_size,
            "job records still outstanding at shutdown"
        );
    }

    // ---------------------------------------------------------------------
    // Submission surface, delegated. See [`Scheduler`] for semantics.
    // ---------------------------------------------------------------------

    pub fn insert_ready(&self, runnable: Option<Runnable>, args: Arguments) -> JobHandle {
        self.scheduler.insert_ready(runnable, args)
    }

    pub fn insert_ready_batch(&self, runnables: &[Runnable], args: &[Arguments]) -> JobHandle {
        self.scheduler.insert_ready_batch(runnables, args)
    }

    pub fn insert_blocked(&self, runnable: Option<Runnable>, args: Arguments) -> BlockedJobHandle {
        self.scheduler.insert_blocked(runnable, args)
    }

    pub fn insert_blocked_batch(
        &self,
        runnables: &[Runnable],
        args: &[Arguments],
    ) -> BlockedJobHandle {
        self.scheduler.insert_blocked_batch(runnables, args)
    }

    pub fn insert_after(
        &self,
        runnable: Option<Runnable>,
        args: Arguments,
        antecedents: &[JobHandle],
    ) -> JobHandle {
        self.scheduler.insert_after(runnable, args, antecedents)
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.shutdown_in_place();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_options_are_rejected() {
        assert!(Manager::new(Options {
            num_threads: 0,
            ..Options::default()
        })
        .is_none());
        assert!(Manager::new(Options {
            free_list_size: 0,
            ..Options::default()
        })
        .is_none());
        assert!(Manager::new(Options {
            ready_list_size: 0,
            ..Options::default()
        })
        .is_none());
    }

    #[test]
    fn default_options_track_the_host() {
        assert!(Options::default().num_threads >= 1);
    }

    #[test]
    fn idle_startup_and_shutdown() {
        let manager = Manager::new(Options {
            num_threads: 2,
            free_list_size: 8,
            ready_list_size: 4,
        })
        .unwrap();
        manager.shutdown();
    }
}
