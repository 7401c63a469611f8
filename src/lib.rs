#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Tasks
//!
//! The asynchronous task-scheduling and spatial-concurrency-control core for
//! chunked voxel data: it coordinates generation, loading, saving and meshing
//! work across a bounded pool of worker threads. The meshing algorithms, file
//! formats and engine bindings live elsewhere; they feed this crate opaque
//! tasks through a small trait.
//!
//! ## Key Modules
//!
//! * `scheduling` - The priority worker pool plus the task trait, per-chunk
//!   sequencer, fan-in dependency tracker, and batched submission
//! * `spatial` - Box-granular reader/writer locking over chunk space
//! * `core` - The counting semaphore the pool parks its workers on
//!
//! ## Architecture
//!
//! A producer thread constructs a task, optionally registers it with an
//! [`scheduling::AsyncDependencyTracker`] when it is part of a fan-in group,
//! optionally routes it through the [`scheduling::ChunkTaskSequencer`] when
//! per-chunk ordering matters, accumulates it in a
//! [`scheduling::TaskBatcher`], and flushes the batch into the
//! [`scheduling::PriorityWorkerPool`]. Workers pick by priority, re-check
//! cancellation, execute, and push results to a completion list that the
//! producer drains on its own schedule - which may create and submit
//! follow-up tasks, closing the loop. Tasks touching shared chunked state
//! claim a [`spatial::SpatialLock`] region for the duration of their
//! critical section.
//!
//! ## Concurrency Model
//!
//! Plain OS threads throughout; no coroutines. Workers block only on the
//! pool's semaphore and lock callers only on the spatial lock's condition
//! variable, both released by explicit posts from the complementary
//! operation (enqueue, unlock), never by timers.

pub mod core;
pub mod scheduling;
pub mod spatial;
