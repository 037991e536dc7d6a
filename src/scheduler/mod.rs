//! Parallel job scheduler with dependency-graph semantics.
//!
//! Jobs are opaque runnables with an antecedent count, drawn from a
//! fixed pool of pre-allocated records and dispatched to a fixed pool of
//! worker threads. A job runs exactly once, after all of its antecedents
//! have completed. Fan-in (one job waiting on many), fan-out (one
//! completion releasing many), explicitly gated jobs, batched submission
//! and blocking waits are all supported; the pool never grows, there are
//! no priorities, and a running job cannot be cancelled.
//!
//! The typical shape:
//!
//! ```no_run
//! use jobsched::{Arguments, Manager, Options, Scheduler};
//!
//! fn step(_sched: &Scheduler, args: &Arguments) {
//!     // args carry four words; encode what you need into them.
//!     let _ = args.a0;
//! }
//!
//! let manager = Manager::new(Options::default()).unwrap();
//! let first = manager.insert_ready(Some(step), Arguments::new(1, 0, 0, 0));
//! let second = manager.insert_after(Some(step), Arguments::new(2, 0, 0, 0), &[first]);
//! second.wait_on();
//! manager.shutdown();
//! ```

mod core;
mod handle;
mod manager;
mod slot;
mod submit;
mod worker;

pub use handle::{BlockedJobHandle, JobHandle};
pub use manager::{Manager, Options};
pub use slot::{Arguments, Runnable};
pub use submit::Scheduler;
