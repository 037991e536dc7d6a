// jobsched — fixed-pool parallel job scheduler with dependency-graph semantics.

pub mod scheduler;
pub mod sync;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level convenience re-exports for the most common API entry points.
// ─────────────────────────────────────────────────────────────────────────────

/// Scheduler lifecycle owner: allocates the job pool, starts and joins the
/// worker threads.
pub use scheduler::Manager;
/// Construction options for [`Manager`].
pub use scheduler::Options;
/// Cloneable submission surface shared by callers, workers and runnables.
pub use scheduler::Scheduler;

/// Handle to a submitted job: completion test and blocking wait.
pub use scheduler::JobHandle;
/// Handle to a job parked behind a caller-released barrier.
pub use scheduler::BlockedJobHandle;

/// The four-word argument tuple copied by value into each job record.
pub use scheduler::Arguments;
/// Job entry point: a plain function pointer.
pub use scheduler::Runnable;

/// Bounded blocking FIFO used as the ready list.
pub use sync::BlockingQueue;
/// Bounded blocking LIFO used as the free list.
pub use sync::BlockingStack;
