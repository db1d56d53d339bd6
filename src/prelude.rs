//! Convenient re-exports for common types and traits

pub use crate::core::{ExceptionMask, Fault, Result, ThreadError};
pub use crate::group::{GatherStatus, ThreadGroup, ThreadGroupConfig};
pub use crate::partition::{NextJob, Range1D, Range2D, RangePartition1D, RangePartition2D};
