//! # Task System Core Traits
//!
//! This module defines the fundamental building blocks of the scheduling
//! system: the `Task` trait implemented by producers of work, the
//! `TaskContext` handed to every running task, and the `TaskItem` bookkeeping
//! wrapper the pool keeps around queued tasks.
//!
//! ## Task Lifecycle
//! 1. A `Task` is created by a producer and enqueued via
//!    `PriorityWorkerPool::enqueue()` (possibly through a `TaskBatcher` or a
//!    `ChunkTaskSequencer` first)
//! 2. A worker thread selects it by priority, re-checks cancellation, and
//!    calls `run()`
//! 3. The task is pushed to the completion list, run or not
//! 4. The producer drains it back out via `dequeue_completed()` and inspects
//!    whatever result state the task recorded in itself
//!
//! ## Ownership
//! A task is owned by exactly one of {producer, pending list, in-flight
//! worker batch, completion list} at any time. It is moved across each of
//! those boundaries as a `Box<dyn Task>`, never shared.
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred between threads
//! - Tasks should own their data; shared state belongs behind explicit
//!   synchronization (for example a spatial lock region)

use std::time::Instant;

/// Execution context passed to [`Task::run`].
///
/// Identifies which worker thread is executing the task. Tasks that keep
/// per-thread scratch state can index it by `thread_index`.
#[derive(Clone, Copy, Debug)]
pub struct TaskContext {
    /// Index of the executing worker thread, in `0..thread_count`.
    pub thread_index: usize,
}

/// A prioritized, cancellable unit of work submitted to the pool.
///
/// Tasks are the primary mechanism for offloading chunk generation, loading,
/// saving and meshing work to background workers. They should be
/// self-contained and own the data they operate on.
///
/// # Implementation Guidelines
/// - Must be `Send` to be transferred between threads
/// - Should be coarse enough to amortize scheduling overhead
/// - Records its own success or failure; the pool only guarantees that a
///   non-cancelled task reaches `run()` exactly once
pub trait Task: Send {
    /// Returns the task's current priority. Lower values are more urgent.
    ///
    /// Called when the task is enqueued and again periodically while it sits
    /// in the pending list, so the value may change over time (for example as
    /// the viewer moves away from a chunk). It must be cheap: workers call it
    /// while holding the pending-list lock.
    fn priority(&self) -> i32;

    /// Returns `true` if the task should be dropped without running.
    ///
    /// Consulted by the pool at selection time and once more immediately
    /// before `run()`. May have side effects the first time it observes
    /// cancellation (for example releasing a reservation). Cancellation is
    /// cooperative: a task already inside `run()` is never interrupted.
    fn is_cancelled(&mut self) -> bool {
        false
    }

    /// Executes the task on a worker thread.
    ///
    /// # Arguments
    /// * `ctx` - Identifies the executing worker thread
    fn run(&mut self, ctx: &TaskContext);
}

/// Pool-internal wrapper around a queued task.
///
/// Caches the last observed priority so the selection scan does not call
/// [`Task::priority`] on every pass, and carries the insertion sequence
/// number used to break priority ties in FIFO order.
pub(crate) struct TaskItem {
    pub task: Box<dyn Task>,
    pub cached_priority: i32,
    pub last_priority_update: Instant,
    pub sequence: u64,
}

impl TaskItem {
    pub fn new(task: Box<dyn Task>, sequence: u64) -> Self {
        let cached_priority = task.priority();
        Self {
            task,
            cached_priority,
            last_priority_update: Instant::now(),
            sequence,
        }
    }

    /// Selection key: priority first, insertion order among equals.
    #[inline]
    pub fn order_key(&self) -> (i32, u64) {
        (self.cached_priority, self.sequence)
    }
}
