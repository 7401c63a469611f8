//! Counting semaphore on top of a mutex and condition variable.

use std::sync::{Condvar, Mutex};

/// A counting semaphore backed by a mutex and condition variable.
///
/// Used by the worker pool to park worker threads when no work is pending:
/// every enqueued task posts one permit, every worker wakeup consumes one.
/// Permits can outnumber pending tasks (a worker may pick several tasks per
/// permit); workers that wake to an empty pending list simply wait again, so
/// surplus permits are harmless.
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    /// Creates a semaphore with `permits` initial permits.
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Blocks the calling thread until a permit is available, then consumes it.
    pub fn wait(&self) {
        let mut permits = self.permits.lock().unwrap();
        while *permits == 0 {
            permits = self.available.wait(permits).unwrap();
        }
        *permits -= 1;
    }

    /// Makes one permit available, waking one waiting thread if any.
    pub fn post(&self) {
        let mut permits = self.permits.lock().unwrap();
        *permits += 1;
        self.available.notify_one();
    }

    /// Makes `count` permits available at once, waking up to `count` waiters.
    ///
    /// Equivalent to `count` calls to [`post`](Self::post) but takes the
    /// internal lock only once.
    pub fn post_many(&self, count: usize) {
        if count == 0 {
            return;
        }
        let mut permits = self.permits.lock().unwrap();
        *permits += count;
        if count == 1 {
            self.available.notify_one();
        } else {
            self.available.notify_all();
        }
    }
}
