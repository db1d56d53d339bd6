//! # Range Thread Group
//!
//! A fixed-size group of persistent worker threads that repeatedly splits 1D
//! and 2D integer domains across its workers.
//!
//! ## Features
//!
//! - **Persistent workers**: threads are spawned once and reused for every run
//! - **Work stealing**: a shared partitioner hands out one sub-range at a
//!   time, so faster workers claim more of the domain
//! - **Adaptive steps**: job size follows the domain length and worker count
//! - **Fault aggregation**: job failures and panics are merged into an
//!   exception record instead of tearing down the worker
//! - **Cooperative stop** and bounded gathering with timeout
//!
//! ## Quick Start
//!
//! ```rust
//! use range_thread_group::prelude::*;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let group = ThreadGroup::with_workers(4)?;
//! group.create()?;
//!
//! // Each worker runs the closure once
//! let counter = Arc::new(AtomicUsize::new(0));
//! let counter_clone = Arc::clone(&counter);
//! group.start_simple(move |_worker| {
//!     counter_clone.fetch_add(1, Ordering::SeqCst);
//!     Ok(())
//! }, None)?;
//! assert_eq!(group.gathering(), GatherStatus::Success);
//! assert_eq!(counter.load(Ordering::SeqCst), 4);
//! # Ok(())
//! # }
//! ```
//!
//! ## Partitioned Runs
//!
//! ```rust
//! use range_thread_group::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let group = ThreadGroup::with_config(ThreadGroupConfig::new(2).with_name("tiles"))?;
//! group.create()?;
//!
//! let mut partition = RangePartition2D::new(group.worker_count());
//! partition.set(0, 640, 0, 480, 64, 0, None, 0);
//!
//! group.start(partition, |tile: Range2D, worker| {
//!     if tile.is_empty() {
//!         return Err(Fault::undefined(format!("empty tile on worker {}", worker)));
//!     }
//!     Ok(())
//! }, None)?;
//!
//! match group.gathering() {
//!     GatherStatus::Success => {}
//!     status => println!("run failed with {}: {}", status, group.exception_source()),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod group;
pub mod partition;
pub mod prelude;
pub mod tracing;

pub use crate::core::{Event, ExceptionMask, ExceptionRecord, Fault, Result, ThreadError};
pub use group::{GatherStatus, ThreadGroup, ThreadGroupConfig};
pub use partition::{NextJob, Range1D, Range2D, RangePartition1D, RangePartition2D};
