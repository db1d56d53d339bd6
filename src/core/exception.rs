//! Exception aggregation for thread group runs
//!
//! Jobs report failures as a [`Fault`]: a set of [`ExceptionMask`] bits plus an
//! optional human readable origin. Workers merge faults into the group's
//! [`ExceptionRecord`]; the bits accumulate while the origin text is replaced by
//! the most recent fault that carries one.

use bitflags::bitflags;
use std::any::Any;
use std::fmt;

bitflags! {
    /// Kinds of failure recorded during a run.
    ///
    /// Bits from `1 << 8` upwards are free for embedder-defined kinds; build
    /// them with [`ExceptionMask::from_bits_retain`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ExceptionMask: u32 {
        /// An unrecognized fault, such as a plain panic
        const UNDEFINED = 1 << 0;
        /// Allocation failure
        const MEMORY = 1 << 1;
    }
}

impl ExceptionMask {
    /// No exception recorded
    pub const NONE: Self = Self::empty();
}

/// A recognized failure raised by a job.
///
/// Return it from an execute closure, or raise it from deep inside the job
/// with [`Fault::raise`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    mask: ExceptionMask,
    origin: Option<String>,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "exception {:#x} in {}", self.mask.bits(), origin),
            None => write!(f, "exception {:#x}", self.mask.bits()),
        }
    }
}

impl std::error::Error for Fault {}

impl Fault {
    /// Create a fault with the given bits and no origin
    pub fn new(mask: ExceptionMask) -> Self {
        Self { mask, origin: None }
    }

    /// Create a fault with the given bits and origin text
    pub fn with_origin(mask: ExceptionMask, origin: impl Into<String>) -> Self {
        Self {
            mask,
            origin: Some(origin.into()),
        }
    }

    /// Allocation failure raised at `origin`
    pub fn memory(origin: impl Into<String>) -> Self {
        Self::with_origin(ExceptionMask::MEMORY, origin)
    }

    /// Unrecognized failure raised at `origin`
    pub fn undefined(origin: impl Into<String>) -> Self {
        Self::with_origin(ExceptionMask::UNDEFINED, origin)
    }

    /// Convert a caught panic payload into a fault.
    ///
    /// A payload raised through [`Fault::raise`] keeps its bits; anything else
    /// becomes [`ExceptionMask::UNDEFINED`] with the panic message as origin.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        match payload.downcast::<Fault>() {
            Ok(fault) => *fault,
            Err(payload) => {
                let message = if let Some(s) = payload.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                Self::undefined(message)
            }
        }
    }

    /// Unwind out of the current job carrying this fault
    pub fn raise(self) -> ! {
        std::panic::panic_any(self)
    }

    /// Exception bits carried by this fault
    pub fn mask(&self) -> ExceptionMask {
        self.mask
    }

    /// Origin text, if any
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }
}

/// Accumulated failure state of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionRecord {
    mask: ExceptionMask,
    origin: Option<String>,
}

impl ExceptionRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything recorded so far
    pub fn reset(&mut self) {
        self.mask = ExceptionMask::NONE;
        self.origin = None;
    }

    /// OR the fault's bits in; its origin replaces the recorded one
    pub fn merge(&mut self, fault: Fault) {
        self.mask |= fault.mask;
        if let Some(origin) = fault.origin {
            self.origin = Some(origin);
        }
    }

    /// True when nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }

    /// True when an unrecognized fault was recorded
    pub fn is_undefined(&self) -> bool {
        self.mask.contains(ExceptionMask::UNDEFINED)
    }

    /// Accumulated bits
    pub fn mask(&self) -> ExceptionMask {
        self.mask
    }

    /// Last recorded origin, empty if none
    pub fn source(&self) -> &str {
        self.origin.as_deref().unwrap_or("")
    }
}
