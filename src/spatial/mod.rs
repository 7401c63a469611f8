//! # Spatial Region Locking
//!
//! This module provides box-granular mutual exclusion over an indexed
//! spatial domain: any thread can claim exclusive (write) or shared (read)
//! access to an axis-aligned box of chunk space, checked for overlap against
//! every other currently-held box, without a lock per underlying chunk.
//!
//! ## Why Boxes Instead of Per-Chunk Mutexes
//! Chunks are created and destroyed dynamically and the addressable space is
//! enormous; allocating a mutex per chunk does not scale. The number of
//! regions held at any moment is bounded by the number of concurrently
//! active worker threads, so an intersection scan over a short list is
//! cheap even though the domain is huge.
//!
//! ## Deadlock Avoidance
//! A thread may hold at most one region at a time. Violating this is a
//! programming error, asserted in debug builds — it is the rule that makes
//! waiting on a region deadlock-free without any queuing machinery.
//!
//! ## Usage
//! ```rust
//! use cgmath::Point3;
//! use voxel_tasks::spatial::{Box3i, SpatialLock};
//!
//! let lock: SpatialLock = SpatialLock::new();
//! let bounds = Box3i::from_min_max(Point3::new(0, 0, 0), Point3::new(2, 2, 2));
//! {
//!     let _region = lock.write(bounds);
//!     // mutate chunks inside `bounds`
//! } // released here, waiters woken
//! ```

use std::sync::{Condvar, Mutex};
use std::thread::{self, ThreadId};

use cgmath::{Point3, Vector3};

/// Bounds type usable with [`SpatialLock`]: cheap to copy, comparable for
/// unlock matching, and testable for overlap.
pub trait RegionBounds: Copy + PartialEq + Send + 'static {
    /// Returns `true` if `self` and `other` share at least one index.
    fn intersects(&self, other: &Self) -> bool;
}

/// An axis-aligned box of chunk positions, half-open on every axis:
/// `min` inclusive, `max` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Box3i {
    /// Inclusive lower corner.
    pub min: Point3<i32>,
    /// Exclusive upper corner.
    pub max: Point3<i32>,
}

impl Box3i {
    /// Creates a box from its corners.
    ///
    /// # Arguments
    /// * `min` - Inclusive lower corner
    /// * `max` - Exclusive upper corner; must be `>= min` on every axis
    pub fn from_min_max(min: Point3<i32>, max: Point3<i32>) -> Self {
        debug_assert!(min.x <= max.x && min.y <= max.y && min.z <= max.z);
        Self { min, max }
    }

    /// Creates a box from its lower corner and size in chunks.
    pub fn from_min_size(min: Point3<i32>, size: Vector3<i32>) -> Self {
        Self::from_min_max(min, min + size)
    }

    /// Creates a box covering exactly one chunk position.
    pub fn single(position: Point3<i32>) -> Self {
        Self::from_min_size(position, Vector3::new(1, 1, 1))
    }

    /// Returns `true` if the box covers no position at all.
    pub fn is_empty(&self) -> bool {
        self.min.x == self.max.x || self.min.y == self.max.y || self.min.z == self.max.z
    }
}

impl RegionBounds for Box3i {
    fn intersects(&self, other: &Self) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
            && self.min.z < other.max.z
            && other.min.z < self.max.z
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LockMode {
    Read,
    Write,
}

/// One currently-held region. Two entries with intersecting bounds can
/// coexist only if both are reads.
struct LockedRegion<B> {
    bounds: B,
    mode: LockMode,
    owner: ThreadId,
}

/// Box-granular reader/writer lock over an indexed spatial domain.
///
/// The active-region list sits behind one short-held mutex: every lock
/// attempt is an O(held regions) intersection scan, and the list length is
/// bounded by the number of threads (each may hold at most one region).
/// Blocked callers wait on a condition variable that every unlock notifies,
/// so all waiters get a chance to retry — no waiter can be stranded by an
/// unlock it did not observe.
pub struct SpatialLock<B: RegionBounds = Box3i> {
    regions: Mutex<Vec<LockedRegion<B>>>,
    unlocked: Condvar,
}

impl<B: RegionBounds> SpatialLock<B> {
    /// Creates a lock with no held regions.
    pub fn new() -> Self {
        Self {
            regions: Mutex::new(Vec::new()),
            unlocked: Condvar::new(),
        }
    }

    /// Attempts to claim shared access to `bounds` without blocking.
    ///
    /// # Returns
    /// `true` if the region was claimed; `false` if an intersecting write
    /// region is held (the region list is unchanged). On success the caller
    /// must pair this with [`unlock_read`](Self::unlock_read).
    pub fn try_lock_read(&self, bounds: B) -> bool {
        let mut regions = self.regions.lock().unwrap();
        Self::try_insert(&mut regions, bounds, LockMode::Read)
    }

    /// Attempts to claim exclusive access to `bounds` without blocking.
    ///
    /// # Returns
    /// `true` if the region was claimed; `false` if any intersecting region
    /// is held. On success the caller must pair this with
    /// [`unlock_write`](Self::unlock_write).
    pub fn try_lock_write(&self, bounds: B) -> bool {
        let mut regions = self.regions.lock().unwrap();
        Self::try_insert(&mut regions, bounds, LockMode::Write)
    }

    /// Claims shared access to `bounds`, blocking until no intersecting
    /// write region is held.
    pub fn lock_read(&self, bounds: B) {
        let mut regions = self.regions.lock().unwrap();
        loop {
            if Self::try_insert(&mut regions, bounds, LockMode::Read) {
                return;
            }
            regions = self.unlocked.wait(regions).unwrap();
        }
    }

    /// Claims exclusive access to `bounds`, blocking until no intersecting
    /// region is held.
    pub fn lock_write(&self, bounds: B) {
        let mut regions = self.regions.lock().unwrap();
        loop {
            if Self::try_insert(&mut regions, bounds, LockMode::Write) {
                return;
            }
            regions = self.unlocked.wait(regions).unwrap();
        }
    }

    /// Releases a read region previously claimed by this thread.
    pub fn unlock_read(&self, bounds: B) {
        self.remove(bounds, LockMode::Read);
    }

    /// Releases a write region previously claimed by this thread.
    pub fn unlock_write(&self, bounds: B) {
        self.remove(bounds, LockMode::Write);
    }

    /// Claims shared access and returns a guard releasing it on drop.
    ///
    /// Prefer this over the raw `lock_read`/`unlock_read` pair: the critical
    /// section cannot forget to release on early return.
    pub fn read(&self, bounds: B) -> SpatialLockReadGuard<'_, B> {
        self.lock_read(bounds);
        SpatialLockReadGuard { lock: self, bounds }
    }

    /// Claims exclusive access and returns a guard releasing it on drop.
    pub fn write(&self, bounds: B) -> SpatialLockWriteGuard<'_, B> {
        self.lock_write(bounds);
        SpatialLockWriteGuard { lock: self, bounds }
    }

    /// Non-blocking variant of [`read`](Self::read).
    pub fn try_read(&self, bounds: B) -> Option<SpatialLockReadGuard<'_, B>> {
        if self.try_lock_read(bounds) {
            Some(SpatialLockReadGuard { lock: self, bounds })
        } else {
            None
        }
    }

    /// Non-blocking variant of [`write`](Self::write).
    pub fn try_write(&self, bounds: B) -> Option<SpatialLockWriteGuard<'_, B>> {
        if self.try_lock_write(bounds) {
            Some(SpatialLockWriteGuard { lock: self, bounds })
        } else {
            None
        }
    }

    /// Returns the number of regions currently held. Diagnostic only.
    pub fn held_region_count(&self) -> usize {
        self.regions.lock().unwrap().len()
    }

    fn try_insert(regions: &mut Vec<LockedRegion<B>>, bounds: B, mode: LockMode) -> bool {
        let owner = thread::current().id();
        debug_assert!(
            !regions.iter().any(|region| region.owner == owner),
            "thread already holds a region; holding two risks deadlock"
        );

        let compatible = regions.iter().all(|region| {
            !region.bounds.intersects(&bounds)
                || (mode == LockMode::Read && region.mode == LockMode::Read)
        });
        if compatible {
            regions.push(LockedRegion {
                bounds,
                mode,
                owner,
            });
        }
        compatible
    }

    fn remove(&self, bounds: B, mode: LockMode) {
        let owner = thread::current().id();
        let mut regions = self.regions.lock().unwrap();
        let position = regions
            .iter()
            .position(|region| region.bounds == bounds && region.mode == mode && region.owner == owner);
        match position {
            Some(index) => {
                regions.swap_remove(index);
            }
            None => {
                debug_assert!(false, "unlock of a region this thread does not hold");
                log::error!("Unlock of a region this thread does not hold");
                return;
            }
        }
        drop(regions);
        // Every unlock wakes every waiter so all of them retry their scan.
        self.unlocked.notify_all();
    }
}

impl<B: RegionBounds> Default for SpatialLock<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped shared access to a region; releases on drop.
pub struct SpatialLockReadGuard<'a, B: RegionBounds> {
    lock: &'a SpatialLock<B>,
    bounds: B,
}

impl<B: RegionBounds> Drop for SpatialLockReadGuard<'_, B> {
    fn drop(&mut self) {
        self.lock.unlock_read(self.bounds);
    }
}

/// Scoped exclusive access to a region; releases on drop.
pub struct SpatialLockWriteGuard<'a, B: RegionBounds> {
    lock: &'a SpatialLock<B>,
    bounds: B,
}

impl<B: RegionBounds> Drop for SpatialLockWriteGuard<'_, B> {
    fn drop(&mut self) {
        self.lock.unlock_write(self.bounds);
    }
}
