//! # Per-Chunk Task Sequencing
//!
//! This module enforces "at most one task for chunk key K is in flight", so
//! tasks addressing the same chunk execute in submission order even though
//! submission and completion happen on different threads. Without it, a
//! stale load completing late could overwrite a newer save of the same
//! chunk.
//!
//! ## State Machine Per Key
//! `IDLE -> IN_FLIGHT -> (IDLE | IN_FLIGHT with next task)`
//!
//! Ordering is strict FIFO with no priority reordering within a key:
//! correctness is prioritized over latency here, because same-chunk races
//! corrupt data rather than just appear slow.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use cgmath::Point3;

use super::task::Task;

/// Number of level-of-detail lanes. Keys with `lod >= MAX_LOD_LEVELS` are
/// rejected at the API boundary.
pub const MAX_LOD_LEVELS: usize = 24;

/// Identifies one unit of spatial data whose tasks must execute in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    /// Chunk position in chunk coordinates.
    pub position: Point3<i32>,
    /// Level-of-detail index, `0..MAX_LOD_LEVELS`.
    pub lod: u8,
}

impl ChunkKey {
    /// Creates a key from a chunk position and LOD index.
    pub fn new(position: Point3<i32>, lod: u8) -> Self {
        debug_assert!((lod as usize) < MAX_LOD_LEVELS);
        Self { position, lod }
    }
}

/// Per-chunk-key FIFO that serializes tasks addressing the same chunk.
///
/// Each LOD level has its own lane behind its own mutex, so sequencing a
/// high-detail chunk never contends with a distant low-detail one. A key
/// being present in its lane means one task for that key is in flight; the
/// queued tasks behind it are handed back one at a time by
/// [`dequeue`](Self::dequeue).
pub struct ChunkTaskSequencer {
    lanes: [Mutex<HashMap<Point3<i32>, VecDeque<Box<dyn Task>>>>; MAX_LOD_LEVELS],
}

impl ChunkTaskSequencer {
    /// Creates an empty sequencer with all keys idle.
    pub fn new() -> Self {
        Self {
            lanes: std::array::from_fn(|_| Mutex::new(HashMap::new())),
        }
    }

    /// Registers `task` for `key`.
    ///
    /// # Returns
    /// - `Some(task)` — the key was idle and is now marked in flight; the
    ///   caller must schedule the returned task itself
    /// - `None` — a task for this key is already in flight; the sequencer
    ///   has taken ownership and will hand the task back from a later
    ///   [`dequeue`](Self::dequeue) call
    pub fn enqueue(&self, task: Box<dyn Task>, key: ChunkKey) -> Option<Box<dyn Task>> {
        let mut lane = self.lanes[key.lod as usize].lock().unwrap();
        match lane.get_mut(&key.position) {
            Some(queue) => {
                queue.push_back(task);
                None
            }
            None => {
                // Empty queue marks the key in flight with no successor yet.
                lane.insert(key.position, VecDeque::new());
                Some(task)
            }
        }
    }

    /// Reports that the in-flight task for `key` has finished and promotes
    /// the next queued task, if any.
    ///
    /// # Returns
    /// - `Some(task)` — the next task in submission order; the key stays in
    ///   flight and the caller must schedule the task
    /// - `None` — no task was queued; the key is idle again
    ///
    /// Calling this for a key with no in-flight task is a contract
    /// violation.
    pub fn dequeue(&self, key: ChunkKey) -> Option<Box<dyn Task>> {
        let mut lane = self.lanes[key.lod as usize].lock().unwrap();
        let Some(queue) = lane.get_mut(&key.position) else {
            debug_assert!(false, "dequeue for idle chunk key {:?}", key);
            log::error!("Dequeue for idle chunk key {:?}", key);
            return None;
        };
        match queue.pop_front() {
            Some(task) => Some(task),
            None => {
                lane.remove(&key.position);
                None
            }
        }
    }

    /// Returns the number of keys currently in flight at `lod`. Diagnostic
    /// only.
    pub fn in_flight_count(&self, lod: u8) -> usize {
        self.lanes[lod as usize].lock().unwrap().len()
    }
}

impl Default for ChunkTaskSequencer {
    fn default() -> Self {
        Self::new()
    }
}
