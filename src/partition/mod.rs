//! Domain partitioning for work-stealing runs
//!
//! A partitioner cuts an integer domain into contiguous jobs and hands them
//! out one at a time through [`NextJob`]. It does no locking of its own: the
//! thread group calls [`NextJob::next_job`] under its bucket lock, so the
//! cursor only ever moves forward one job per call.

pub mod range_1d;
pub mod range_2d;

pub use range_1d::{Range1D, RangePartition1D};
pub use range_2d::{Range2D, RangePartition2D};

/// Domains longer than this are cut into `used * 1024` jobs
pub const LARGE_DOMAIN: i64 = 1_048_576;

/// Domains longer than this are cut into `used * 4` jobs
pub const MEDIUM_DOMAIN: i64 = 10_240;

/// Source of jobs for a work-stealing run.
///
/// `next_job` is always called with the group's bucket lock held and returns
/// `None` once the source is exhausted.
pub trait NextJob: Send + 'static {
    /// Job handed to the execute callback
    type Job: Send + 'static;

    /// Claim the next job on behalf of `worker`
    fn next_job(&mut self, worker: usize) -> Option<Self::Job>;

    /// Highest worker count this source can serve, `None` if unbounded.
    ///
    /// Sources that keep a record per worker report their record count so
    /// that a run with more workers is refused before it starts.
    fn worker_slots(&self) -> Option<usize> {
        None
    }
}

/// [`NextJob`] adapter for a closure, see [`from_fn`]
pub struct FnNext<F>(F);

impl<F> std::fmt::Debug for FnNext<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnNext")
    }
}

/// Build a job source from a closure `FnMut(worker) -> Option<Job>`
pub fn from_fn<F, J>(f: F) -> FnNext<F>
where
    F: FnMut(usize) -> Option<J> + Send + 'static,
    J: Send + 'static,
{
    FnNext(f)
}

impl<F, J> NextJob for FnNext<F>
where
    F: FnMut(usize) -> Option<J> + Send + 'static,
    J: Send + 'static,
{
    type Job = J;

    fn next_job(&mut self, worker: usize) -> Option<J> {
        (self.0)(worker)
    }
}

/// Resolve a requested worker count against the available workers.
///
/// `None`, zero, or anything at or above `available` means "all of them".
pub fn clamp_used_workers(requested: Option<usize>, available: usize) -> usize {
    match requested {
        Some(n) if n > 0 && n < available => n,
        _ => available,
    }
}

/// Ceiling division for a non-negative numerator and positive divisor
pub(crate) fn ceil_div(len: i64, divisor: i64) -> i64 {
    if len <= 0 {
        return 0;
    }
    (len - 1) / divisor + 1
}

/// Step size for a domain of `len` shared by `used` workers.
///
/// Short domains get one job per worker, medium ones four, long ones 1024,
/// so faster workers can pick up the slack. Never below 1.
pub fn adaptive_step(len: i64, used: usize) -> i64 {
    let used = used.max(1) as i64;
    let jobs_per_worker = if len > LARGE_DOMAIN {
        1024
    } else if len > MEDIUM_DOMAIN {
        4
    } else {
        1
    };
    ceil_div(len, used.saturating_mul(jobs_per_worker)).max(1)
}

/// Explicit step if positive, adaptive otherwise
pub(crate) fn resolve_step(step: i64, len: i64, used: usize) -> i64 {
    if step > 0 {
        step
    } else {
        adaptive_step(len, used)
    }
}

/// Width of `[begin, end)`, zero when empty or inverted.
///
/// Widened so that domains such as `[i64::MIN, i64::MAX)` do not overflow.
pub(crate) fn span(begin: i64, end: i64) -> i128 {
    (i128::from(end) - i128::from(begin)).max(0)
}

/// Clamp a widened value back into `i64`
pub(crate) fn narrow(value: i128) -> i64 {
    value.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Number of `step` sized jobs covering `span`, saturating at `i64::MAX`
pub(crate) fn job_count(span: i128, step: i64) -> i64 {
    let step = i128::from(step.max(1));
    narrow((span + step - 1) / step)
}

/// Bounds of job `index` when `[begin, end)` is cut into `step` sized jobs
pub(crate) fn job_bounds(begin: i64, end: i64, step: i64, index: i64) -> (i64, i64) {
    let start = i128::from(begin) + i128::from(index) * i128::from(step);
    let stop = (start + i128::from(step)).min(i128::from(end));
    (narrow(start), narrow(stop))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adaptive_step_tiers() {
        assert_eq!(adaptive_step(10, 2), 5);
        assert_eq!(adaptive_step(10, 3), 4);
        assert_eq!(adaptive_step(10_240, 4), 2_560);
        assert_eq!(adaptive_step(10_241, 4), 641);
        assert_eq!(adaptive_step(1_048_576, 1), 262_144);
        assert_eq!(adaptive_step(1_048_577, 1), 1_025);
        assert_eq!(adaptive_step(4_000_000, 8), 489);
    }

    #[test]
    fn test_adaptive_step_floor() {
        assert_eq!(adaptive_step(0, 4), 1);
        assert_eq!(adaptive_step(-5, 4), 1);
        assert_eq!(adaptive_step(3, 16), 1);
        assert_eq!(adaptive_step(100, 0), 100);
    }

    #[test]
    fn test_clamp_used_workers() {
        assert_eq!(clamp_used_workers(None, 8), 8);
        assert_eq!(clamp_used_workers(Some(0), 8), 8);
        assert_eq!(clamp_used_workers(Some(3), 8), 3);
        assert_eq!(clamp_used_workers(Some(8), 8), 8);
        assert_eq!(clamp_used_workers(Some(20), 8), 8);
    }

    #[test]
    fn test_ceil_div() {
        assert_eq!(ceil_div(10, 3), 4);
        assert_eq!(ceil_div(9, 3), 3);
        assert_eq!(ceil_div(0, 3), 0);
    }

    #[test]
    fn test_job_math_near_i64_limits() {
        assert_eq!(span(9, 3), 0);
        assert_eq!(span(i64::MIN, i64::MAX), i128::from(u64::MAX));
        assert_eq!(job_count(5, i64::MAX), 1);
        assert_eq!(job_count(span(i64::MIN, i64::MAX), 1), i64::MAX);

        assert_eq!(job_bounds(5, 10, i64::MAX, 0), (5, 10));
        assert_eq!(job_bounds(i64::MAX - 3, i64::MAX, 2, 1), (i64::MAX - 1, i64::MAX));
        assert_eq!(job_bounds(i64::MIN, i64::MAX, 1 << 62, 3), (1 << 62, i64::MAX));
    }

    #[test]
    fn test_from_fn_source() {
        let mut remaining = 3;
        let mut source = from_fn(move |worker| {
            if remaining == 0 {
                None
            } else {
                remaining -= 1;
                Some(worker * 10 + remaining)
            }
        });

        assert_eq!(source.next_job(1), Some(12));
        assert_eq!(source.next_job(2), Some(21));
        assert_eq!(source.next_job(1), Some(10));
        assert_eq!(source.next_job(1), None);
    }
}
