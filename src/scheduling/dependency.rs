//! # Async Dependency Tracking
//!
//! This module provides `AsyncDependencyTracker`, the fan-in primitive that
//! lets N independently-scheduled sibling tasks report completion or abort
//! into one shared counter, dispatching a follow-up action exactly once when
//! the last sibling reports in.
//!
//! ## Typical Use
//! A chunk save is split into parallel sub-tasks; the reload of that chunk
//! must start only after every sub-task finished, and must not start at all
//! if any of them failed. Each sub-task holds an `Arc` to the tracker and
//! calls `post_complete()` or `abort()` exactly once.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use super::task::Task;

/// Callback used to hand follow-up tasks to a scheduler once all siblings
/// completed successfully.
pub type FollowUpDispatch = Box<dyn FnOnce(Vec<Box<dyn Task>>) + Send>;

struct FollowUp {
    tasks: Vec<Box<dyn Task>>,
    dispatch: FollowUpDispatch,
}

/// Atomic fan-in counter over N sibling tasks.
///
/// Constructed with the number of siblings expected; each sibling calls
/// [`post_complete`](Self::post_complete) or [`abort`](Self::abort) exactly
/// once. The caller that observes the counter reach zero dispatches the
/// follow-up tasks (if any and not aborted) — exactly once, even when all
/// siblings report concurrently, because the zero transition is detected from
/// the previous value returned by the atomic decrement.
///
/// # Contract
/// - Each sibling reports exactly once; reporting more often than
///   `initial_count` times is a programming error
/// - The tracker must not be dropped while completions are outstanding: a
///   live sibling would call into freed state. Detected and asserted in
///   debug builds, logged in release builds.
pub struct AsyncDependencyTracker {
    remaining: AtomicU32,
    aborted: AtomicBool,
    follow_up: Mutex<Option<FollowUp>>,
}

impl AsyncDependencyTracker {
    /// Creates a tracker expecting `initial_count` sibling reports, with no
    /// follow-up action.
    ///
    /// # Arguments
    /// * `initial_count` - Number of siblings that will report in; must be
    ///   at least 1
    pub fn new(initial_count: u32) -> Self {
        debug_assert!(initial_count > 0, "tracker created with no siblings");
        Self {
            remaining: AtomicU32::new(initial_count),
            aborted: AtomicBool::new(false),
            follow_up: Mutex::new(None),
        }
    }

    /// Creates a tracker that hands `tasks` to `dispatch` when the last
    /// sibling reports in, unless any sibling aborted — in that case the
    /// tasks are dropped.
    ///
    /// # Arguments
    /// * `initial_count` - Number of siblings that will report in
    /// * `tasks` - Follow-up tasks to dispatch on success
    /// * `dispatch` - Scheduler callback receiving the tasks, typically a
    ///   closure capturing a pool or batcher handle
    pub fn with_follow_up(
        initial_count: u32,
        tasks: Vec<Box<dyn Task>>,
        dispatch: FollowUpDispatch,
    ) -> Self {
        let tracker = Self::new(initial_count);
        *tracker.follow_up.lock().unwrap() = Some(FollowUp { tasks, dispatch });
        tracker
    }

    /// Reports one sibling as successfully completed.
    ///
    /// The call that observes the counter transition to zero dispatches the
    /// follow-up tasks. Safe to call from any thread.
    pub fn post_complete(&self) {
        let previous = self.remaining.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "more completions than tracked siblings");
        if previous == 1 {
            self.on_last_completion();
        }
    }

    /// Reports one sibling as failed.
    ///
    /// Marks the aggregate result aborted (idempotent) and counts as a
    /// completion for the purpose of reaching zero, so the zero transition
    /// still happens after partial failure — the follow-up tasks are then
    /// dropped instead of dispatched.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
        let previous = self.remaining.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "more completions than tracked siblings");
        if previous == 1 {
            self.on_last_completion();
        }
    }

    /// Returns `true` if any sibling aborted. May be stale in a concurrent
    /// setting; diagnostics and single-threaded polling only.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Returns `true` once every sibling has reported in. May be stale in a
    /// concurrent setting; diagnostics and single-threaded polling only.
    pub fn is_complete(&self) -> bool {
        self.remaining.load(Ordering::Acquire) == 0
    }

    /// Returns the number of siblings that have not yet reported in.
    pub fn remaining_count(&self) -> u32 {
        self.remaining.load(Ordering::Acquire)
    }

    fn on_last_completion(&self) {
        let follow_up = self.follow_up.lock().unwrap().take();
        if let Some(follow_up) = follow_up {
            if self.is_aborted() {
                log::debug!(
                    "Dependency aborted; dropping {} follow-up tasks",
                    follow_up.tasks.len()
                );
            } else {
                (follow_up.dispatch)(follow_up.tasks);
            }
        }
    }
}

impl Drop for AsyncDependencyTracker {
    fn drop(&mut self) {
        let remaining = self.remaining.load(Ordering::Acquire);
        if remaining != 0 {
            debug_assert!(
                false,
                "dependency tracker dropped with {} completions outstanding",
                remaining
            );
            log::error!(
                "Dependency tracker dropped with {} completions outstanding",
                remaining
            );
        }
    }
}
