//! Shared helpers for the integration tests: a task type that records its
//! execution into a shared log, and logger setup.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use voxel_tasks::scheduling::{Task, TaskContext};

/// Initializes env_logger once per test binary.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Shared record of completed task ids, in run order.
pub type CompletionLog = Arc<Mutex<Vec<u32>>>;

pub fn new_log() -> CompletionLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn log_contents(log: &CompletionLog) -> Vec<u32> {
    log.lock().unwrap().clone()
}

/// A task that appends its id to a shared log when run. Priority is fixed;
/// cancellation is driven by a shared flag.
pub struct RecordingTask {
    id: u32,
    priority: i32,
    cancel: Arc<AtomicBool>,
    ran: Arc<AtomicBool>,
    log: CompletionLog,
}

impl RecordingTask {
    pub fn new(id: u32, priority: i32, log: &CompletionLog) -> Self {
        Self {
            id,
            priority,
            cancel: Arc::new(AtomicBool::new(false)),
            ran: Arc::new(AtomicBool::new(false)),
            log: log.clone(),
        }
    }

    /// Flag that makes `is_cancelled()` return true once set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Flag set the first time `run()` executes.
    pub fn ran_flag(&self) -> Arc<AtomicBool> {
        self.ran.clone()
    }
}

impl Task for RecordingTask {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_cancelled(&mut self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    fn run(&mut self, _ctx: &TaskContext) {
        self.ran.store(true, Ordering::Release);
        self.log.lock().unwrap().push(self.id);
    }
}

/// A task whose priority is read from a shared atomic on every `priority()`
/// call, for exercising re-prioritization while queued.
pub struct DynamicPriorityTask {
    id: u32,
    priority: Arc<AtomicI32>,
    log: CompletionLog,
}

impl DynamicPriorityTask {
    pub fn new(id: u32, initial_priority: i32, log: &CompletionLog) -> Self {
        Self {
            id,
            priority: Arc::new(AtomicI32::new(initial_priority)),
            log: log.clone(),
        }
    }

    pub fn priority_handle(&self) -> Arc<AtomicI32> {
        self.priority.clone()
    }
}

impl Task for DynamicPriorityTask {
    fn priority(&self) -> i32 {
        self.priority.load(Ordering::Acquire)
    }

    fn run(&mut self, _ctx: &TaskContext) {
        self.log.lock().unwrap().push(self.id);
    }
}

/// A task that spins until released, used to pin a worker while the pending
/// list is arranged behind it.
pub struct BlockingTask {
    release: Arc<AtomicBool>,
}

impl BlockingTask {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let release = Arc::new(AtomicBool::new(false));
        (
            Self {
                release: release.clone(),
            },
            release,
        )
    }
}

impl Task for BlockingTask {
    fn priority(&self) -> i32 {
        i32::MIN
    }

    fn run(&mut self, _ctx: &TaskContext) {
        while !self.release.load(Ordering::Acquire) {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }
}
