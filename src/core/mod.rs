//! # Core Module
//!
//! This module provides the fundamental concurrency primitives used by the
//! scheduling and spatial modules. Everything in here wraps OS-level
//! synchronization from the standard library; nothing in here knows about
//! tasks, chunks, or priorities.
//!
//! ## Key Components
//! - `Semaphore`: Counting semaphore backed by a mutex and condition variable,
//!   used to park and wake worker threads
//!
//! ## Usage
//! ```rust
//! use voxel_tasks::core::Semaphore;
//!
//! let sem = Semaphore::new(0);
//! sem.post();
//! sem.wait(); // consumes the permit without blocking
//! ```

pub mod semaphore;

// Re-export types for easier access
pub use semaphore::Semaphore;
