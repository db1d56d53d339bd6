//! Outcome of gathering a run

use crate::core::ExceptionRecord;
use std::fmt;

/// Result of [`ThreadGroup::gathering`](crate::ThreadGroup::gathering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatherStatus {
    /// Every used worker finished without a recorded fault
    Success,
    /// The bounded wait expired; the run is still in flight
    TimedOut,
    /// The group was not created, or an undefined fault was recorded
    Failed,
    /// A recognized fault was recorded
    Exception,
}

impl GatherStatus {
    /// Classify the exception state of a finished run
    pub fn from_record(record: &ExceptionRecord) -> Self {
        if record.is_undefined() {
            GatherStatus::Failed
        } else if !record.is_empty() {
            GatherStatus::Exception
        } else {
            GatherStatus::Success
        }
    }

    /// Integer status code: 0, -1, -2 or -3
    pub fn code(self) -> i32 {
        match self {
            GatherStatus::Success => 0,
            GatherStatus::TimedOut => -1,
            GatherStatus::Failed => -2,
            GatherStatus::Exception => -3,
        }
    }

    /// True for [`GatherStatus::Success`]
    pub fn is_success(self) -> bool {
        self == GatherStatus::Success
    }
}

impl fmt::Display for GatherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            GatherStatus::Success => "success",
            GatherStatus::TimedOut => "timed out",
            GatherStatus::Failed => "failed",
            GatherStatus::Exception => "exception",
        };
        write!(f, "{} ({})", text, self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ExceptionMask, Fault};

    #[test]
    fn test_codes() {
        assert_eq!(GatherStatus::Success.code(), 0);
        assert_eq!(GatherStatus::TimedOut.code(), -1);
        assert_eq!(GatherStatus::Failed.code(), -2);
        assert_eq!(GatherStatus::Exception.code(), -3);
        assert_eq!(GatherStatus::Exception.to_string(), "exception (-3)");
    }

    #[test]
    fn test_from_record() {
        let mut record = ExceptionRecord::new();
        assert_eq!(GatherStatus::from_record(&record), GatherStatus::Success);

        record.merge(Fault::memory("a"));
        assert_eq!(GatherStatus::from_record(&record), GatherStatus::Exception);

        record.merge(Fault::new(ExceptionMask::UNDEFINED));
        assert_eq!(GatherStatus::from_record(&record), GatherStatus::Failed);
    }
}
