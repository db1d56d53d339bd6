//! Core types for the thread group

pub mod error;
pub mod event;
pub mod exception;

pub use error::{Result, ThreadError};
pub use event::Event;
pub use exception::{ExceptionMask, ExceptionRecord, Fault};
