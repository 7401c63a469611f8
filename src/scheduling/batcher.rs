//! # Batched Task Submission
//!
//! A producer thread generating many tasks in a tight loop (a whole ring of
//! chunks entering view, say) should not take the pool's pending-list lock
//! once per task. `TaskBatcher` accumulates the tasks locally and flushes
//! them with one batched enqueue per target pool.
//!
//! The batcher is an explicit value passed into the call sites that need it,
//! not a thread-local singleton, so the same code runs under tests without
//! real producer threads.

use super::{PriorityWorkerPool, Task};

/// Which pool a batched task is destined for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskCategory {
    /// CPU-bound work: generation, meshing.
    Compute,
    /// Blocking I/O: chunk loading and saving.
    Io,
}

/// Per-producer buffer that accumulates tasks and submits them in one
/// batched call per category.
///
/// Tasks belong to the target pool from the moment [`flush`](Self::flush)
/// is called. A batcher that still holds tasks when it is dropped is a usage
/// error (a flush was forgotten); it is logged, never silently ignored.
#[derive(Default)]
pub struct TaskBatcher {
    compute: Vec<Box<dyn Task>>,
    io: Vec<Box<dyn Task>>,
}

impl TaskBatcher {
    /// Creates an empty batcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a task to the sub-list for `category`.
    pub fn push(&mut self, category: TaskCategory, task: Box<dyn Task>) {
        match category {
            TaskCategory::Compute => self.compute.push(task),
            TaskCategory::Io => self.io.push(task),
        }
    }

    /// Returns `true` if no task is buffered in any category.
    pub fn is_empty(&self) -> bool {
        self.compute.is_empty() && self.io.is_empty()
    }

    /// Returns the total number of buffered tasks across all categories.
    pub fn pending_count(&self) -> usize {
        self.compute.len() + self.io.len()
    }

    /// Submits each non-empty sub-list to its pool and clears the batcher.
    ///
    /// # Arguments
    /// * `compute_pool` - Receives [`TaskCategory::Compute`] tasks
    /// * `io_pool` - Receives [`TaskCategory::Io`] tasks
    pub fn flush(&mut self, compute_pool: &PriorityWorkerPool, io_pool: &PriorityWorkerPool) {
        if !self.compute.is_empty() {
            compute_pool.enqueue_batch(std::mem::take(&mut self.compute));
        }
        if !self.io.is_empty() {
            io_pool.enqueue_batch(std::mem::take(&mut self.io));
        }
    }

    /// Submits all buffered tasks, regardless of category, to one pool.
    ///
    /// Convenience for setups running a single pool.
    pub fn flush_to(&mut self, pool: &PriorityWorkerPool) {
        let mut tasks = std::mem::take(&mut self.compute);
        tasks.append(&mut self.io);
        pool.enqueue_batch(tasks);
    }
}

impl Drop for TaskBatcher {
    fn drop(&mut self) {
        let pending = self.pending_count();
        if pending > 0 {
            log::warn!("Task batcher dropped with {} unflushed tasks", pending);
        }
    }
}
