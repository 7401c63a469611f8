//! # Task Scheduling System
//!
//! This module provides the priority-ordered task scheduler that coordinates
//! generation, loading, saving and meshing of chunked voxel data across a
//! bounded pool of worker threads.
//!
//! ## Architecture Overview
//!
//! The scheduling system consists of several key components:
//! - `PriorityWorkerPool`: Fixed set of worker threads running the
//!   highest-priority, non-cancelled pending tasks
//! - `Task`: A prioritized, cancellable unit of work (see [`task`])
//! - `ChunkTaskSequencer`: Per-chunk FIFO so same-chunk tasks never race
//! - `AsyncDependencyTracker`: Fan-in counter dispatching a follow-up action
//!   exactly once when the last sibling task reports in
//! - `TaskBatcher`: Per-producer buffer that flushes tasks in one batched
//!   submission
//!
//! ## Task Lifecycle
//! 1. A producer constructs a task, optionally registers it with an
//!    `AsyncDependencyTracker` and/or routes it through the
//!    `ChunkTaskSequencer`
//! 2. The task is accumulated in a `TaskBatcher` and flushed into the pool
//! 3. A worker selects it by priority, runs it (unless cancelled), and pushes
//!    it to the completion list
//! 4. The producer drains completed tasks on its own schedule via
//!    `dequeue_completed()`, which may create and submit follow-up tasks
//!
//! ## Ordering Guarantees
//! - Across different chunk keys, priority is the only ordering signal
//! - For one chunk key routed through the sequencer, strict submission-order
//!   FIFO regardless of which worker runs which task
//! - Priority ties are broken FIFO by insertion order
//!
//! ## Example Usage
//! ```rust
//! use voxel_tasks::scheduling::{PoolConfig, PriorityWorkerPool};
//!
//! let pool = PriorityWorkerPool::new(PoolConfig {
//!     thread_count: 2,
//!     ..PoolConfig::default()
//! });
//!
//! // ... enqueue tasks ...
//!
//! pool.wait_for_all_tasks();
//! pool.dequeue_completed(|task| {
//!     // inspect the result state the task recorded in itself
//!     drop(task);
//! });
//! ```

pub mod batcher;
pub mod dependency;
pub mod sequencer;
pub mod task;

mod worker;

pub use batcher::{TaskBatcher, TaskCategory};
pub use dependency::AsyncDependencyTracker;
pub use sequencer::{ChunkKey, ChunkTaskSequencer};
pub use task::{Task, TaskContext};
pub use worker::WorkerState;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::core::Semaphore;
use task::TaskItem;
use worker::ThreadSlot;

/// Configuration for a [`PriorityWorkerPool`].
///
/// All values are fixed at construction; the pool cannot be resized or
/// reconfigured afterwards.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Number of worker threads to create.
    pub thread_count: usize,
    /// Maximum number of tasks a worker selects per picking pass.
    pub batch_count: usize,
    /// How long a cached priority stays fresh before the next picking pass
    /// re-evaluates `priority()` and `is_cancelled()` for the item.
    pub priority_update_period: Duration,
    /// Prefix for worker thread names, suffixed with the thread index.
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            thread_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            batch_count: 16,
            priority_update_period: Duration::from_millis(200),
            thread_name_prefix: String::from("task-worker"),
        }
    }
}

/// State shared between the pool handle and its worker threads.
pub(crate) struct Shared {
    pub batch_count: usize,
    pub priority_update_period: Duration,
    /// Tasks waiting to be selected. Guarded by its own mutex so producers
    /// and result-draining never contend with each other.
    pub pending: Mutex<Vec<TaskItem>>,
    /// Tasks that have run (or were cancelled before running), waiting for
    /// the producer to drain them.
    pub completed: Mutex<Vec<Box<dyn Task>>>,
    /// Posted once per enqueued task; workers wait on it when the pending
    /// list holds no runnable task.
    pub work_available: Semaphore,
    /// Monotonic insertion counter used to break priority ties FIFO.
    pub next_sequence: AtomicU64,
}

/// A fixed pool of worker threads that always prefers the lowest-priority
/// (most urgent) non-cancelled pending task.
///
/// # Scheduling Model
/// Workers repeatedly lock the pending list, select up to
/// [`PoolConfig::batch_count`] tasks in ascending `(priority, insertion)`
/// order, run them, and push them to the completion list in one locked pass.
/// Items whose cached priority is older than
/// [`PoolConfig::priority_update_period`] are re-evaluated during selection;
/// items observed cancelled are routed to the completion list without
/// running.
///
/// # Failure Semantics
/// The pool does not catch panics from [`Task::run`]. A failing task records
/// its own failure for the producer to inspect after
/// [`dequeue_completed`](Self::dequeue_completed); the pool only guarantees
/// the task was selected exactly once and reached `run()` unless cancelled
/// beforehand.
pub struct PriorityWorkerPool {
    shared: Arc<Shared>,
    slots: Vec<Arc<ThreadSlot>>,
    workers: Vec<JoinHandle<()>>,
}

impl PriorityWorkerPool {
    /// Creates the pool and starts its worker threads.
    ///
    /// # Arguments
    /// * `config` - Thread count, batch size and priority refresh period;
    ///   all fixed for the lifetime of the pool
    ///
    /// # Panics
    /// Panics if `config.thread_count` is zero or OS thread creation fails.
    pub fn new(config: PoolConfig) -> Self {
        assert!(config.thread_count > 0, "pool needs at least one worker");
        assert!(config.batch_count > 0, "batch_count must be at least 1");

        let shared = Arc::new(Shared {
            batch_count: config.batch_count,
            priority_update_period: config.priority_update_period,
            pending: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
            work_available: Semaphore::new(0),
            next_sequence: AtomicU64::new(0),
        });

        let mut slots = Vec::with_capacity(config.thread_count);
        let mut workers = Vec::with_capacity(config.thread_count);

        for thread_index in 0..config.thread_count {
            let slot = Arc::new(ThreadSlot::new());
            let shared = shared.clone();
            let worker_slot = slot.clone();

            let handle = std::thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, thread_index))
                .spawn(move || worker::worker_main(shared, worker_slot, thread_index))
                .expect("failed to spawn worker thread");

            slots.push(slot);
            workers.push(handle);
        }

        log::info!(
            "Started priority worker pool: {} threads, batch {}, refresh {:?}",
            config.thread_count,
            config.batch_count,
            config.priority_update_period
        );

        Self {
            shared,
            slots,
            workers,
        }
    }

    /// Submits a single task for execution.
    ///
    /// The pending list is locked once and the wakeup semaphore posted once.
    /// Prefer [`enqueue_batch`](Self::enqueue_batch) (or a [`TaskBatcher`])
    /// when submitting many tasks from a tight loop.
    pub fn enqueue(&self, task: Box<dyn Task>) {
        let sequence = self.shared.next_sequence.fetch_add(1, Ordering::Relaxed);
        let item = TaskItem::new(task, sequence);
        self.shared.pending.lock().unwrap().push(item);
        self.shared.work_available.post();
    }

    /// Submits a batch of tasks in one locked pass.
    ///
    /// All tasks are inserted before any worker is woken, so a single-worker
    /// pool observes the whole batch when it picks.
    pub fn enqueue_batch(&self, tasks: Vec<Box<dyn Task>>) {
        if tasks.is_empty() {
            return;
        }
        let count = tasks.len();
        {
            let mut pending = self.shared.pending.lock().unwrap();
            for task in tasks {
                let sequence = self.shared.next_sequence.fetch_add(1, Ordering::Relaxed);
                pending.push(TaskItem::new(task, sequence));
            }
        }
        self.shared.work_available.post_many(count);
    }

    /// Drains the completion list, invoking `visitor` once per task.
    ///
    /// This is the only way producers get tasks back. Every enqueued task is
    /// observed here exactly once, whether it ran or was cancelled. The list
    /// is swapped out under its lock before visiting, so the visitor may
    /// enqueue follow-up tasks into this pool without deadlocking.
    pub fn dequeue_completed(&self, mut visitor: impl FnMut(Box<dyn Task>)) {
        let drained = std::mem::take(&mut *self.shared.completed.lock().unwrap());
        for task in drained {
            visitor(task);
        }
    }

    /// Blocks until the pending list is empty and every worker is waiting.
    ///
    /// Poll-with-sleep; intended for flush and shutdown paths, not hot paths.
    /// Completed tasks still need to be drained with
    /// [`dequeue_completed`](Self::dequeue_completed) afterwards.
    pub fn wait_for_all_tasks(&self) {
        loop {
            let pending_empty = self.shared.pending.lock().unwrap().is_empty();
            if pending_empty && self.slots.iter().all(|slot| slot.is_waiting()) {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    /// Returns the number of tasks currently in the pending list.
    ///
    /// Diagnostic only; stale the instant it returns.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().unwrap().len()
    }

    /// Returns the number of worker threads.
    pub fn thread_count(&self) -> usize {
        self.slots.len()
    }

    /// Returns a snapshot of each worker's state, for diagnostics overlays.
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.slots.iter().map(|slot| slot.state()).collect()
    }
}

impl Drop for PriorityWorkerPool {
    fn drop(&mut self) {
        for slot in &self.slots {
            slot.request_stop();
        }
        // One permit per worker so none stays parked on the semaphore.
        self.shared.work_available.post_many(self.slots.len());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }

        let abandoned = self.shared.pending.lock().unwrap().len();
        if abandoned > 0 {
            log::warn!("Worker pool dropped with {} pending tasks", abandoned);
        }
        log::info!("Stopped priority worker pool");
    }
}
