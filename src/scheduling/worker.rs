//! Worker thread loop and per-worker state.
//!
//! Each worker cycles through `PICKING -> (WAITING | RUNNING)`: pick the
//! best pending tasks under the list lock, park on the semaphore if nothing
//! was runnable, otherwise run the batch and hand it to the completion list.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::task::{Task, TaskContext, TaskItem};
use super::Shared;

/// What a worker thread is currently doing. Readable by any thread through
/// `PriorityWorkerPool::worker_states()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Executing a batch of tasks.
    Running = 0,
    /// Scanning the pending list for the next batch.
    Picking = 1,
    /// Parked on the wakeup semaphore; no runnable task was found.
    Waiting = 2,
    /// The worker loop has exited.
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Running,
            1 => WorkerState::Picking,
            2 => WorkerState::Waiting,
            _ => WorkerState::Stopped,
        }
    }
}

/// One worker's mutable state, shared between the worker thread and the pool
/// handle. Created at pool start, read until pool drop.
pub(crate) struct ThreadSlot {
    stop: AtomicBool,
    waiting: AtomicBool,
    state: AtomicU8,
}

impl ThreadSlot {
    pub fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            waiting: AtomicBool::new(false),
            state: AtomicU8::new(WorkerState::Picking as u8),
        }
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::Acquire)
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }
}

/// Entry point of each worker thread.
pub(crate) fn worker_main(shared: Arc<Shared>, slot: Arc<ThreadSlot>, thread_index: usize) {
    let ctx = TaskContext { thread_index };
    let mut batch: Vec<TaskItem> = Vec::with_capacity(shared.batch_count);

    while !slot.stop.load(Ordering::Acquire) {
        slot.set_state(WorkerState::Picking);
        pick_batch(&shared, &mut batch);

        if batch.is_empty() {
            // Nothing runnable. Park until an enqueue posts a permit. Surplus
            // permits (a previous pick consumed several tasks on one permit)
            // just cause an extra empty pass through this loop.
            slot.waiting.store(true, Ordering::Release);
            slot.set_state(WorkerState::Waiting);
            shared.work_available.wait();
            slot.waiting.store(false, Ordering::Release);
            continue;
        }

        slot.set_state(WorkerState::Running);
        for item in batch.iter_mut() {
            // Priorities and cancellation may have changed since selection.
            if !item.task.is_cancelled() {
                item.task.run(&ctx);
            }
        }

        // Hand the whole batch back in one locked pass.
        let mut completed = shared.completed.lock().unwrap();
        completed.extend(batch.drain(..).map(|item| item.task));
    }

    slot.set_state(WorkerState::Stopped);
}

/// Selects up to `batch_count` tasks from the pending list in ascending
/// `(cached_priority, sequence)` order.
///
/// Items whose cached priority is older than the refresh period get their
/// cancellation flag and priority re-evaluated during the scan; items found
/// cancelled are moved straight to the completion list without running.
fn pick_batch(shared: &Shared, batch: &mut Vec<TaskItem>) {
    let mut cancelled: Vec<Box<dyn Task>> = Vec::new();

    {
        let mut pending = shared.pending.lock().unwrap();
        let now = Instant::now();

        for _ in 0..shared.batch_count {
            let mut best: Option<usize> = None;

            let mut i = 0;
            while i < pending.len() {
                let item = &mut pending[i];

                if now.duration_since(item.last_priority_update)
                    >= shared.priority_update_period
                {
                    if item.task.is_cancelled() {
                        // swap_remove is fine: ordering is carried by the
                        // sequence number, not by list position.
                        cancelled.push(pending.swap_remove(i).task);
                        continue;
                    }
                    let item = &mut pending[i];
                    item.cached_priority = item.task.priority();
                    item.last_priority_update = now;
                }

                let key = pending[i].order_key();
                match best {
                    Some(b) if pending[b].order_key() <= key => {}
                    _ => best = Some(i),
                }
                i += 1;
            }

            match best {
                Some(index) => batch.push(pending.swap_remove(index)),
                None => break,
            }
        }
    }

    if !cancelled.is_empty() {
        let mut completed = shared.completed.lock().unwrap();
        completed.append(&mut cancelled);
    }
}
