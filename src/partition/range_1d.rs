//! One-dimensional range partitioner

use super::{clamp_used_workers, job_bounds, job_count, narrow, resolve_step, span, NextJob};
use serde::{Deserialize, Serialize};

/// A contiguous slice `[begin, end)` of a 1D domain assigned to one worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range1D {
    /// First index of the job
    pub begin: i64,
    /// One past the last index of the job
    pub end: i64,
    /// Length of the whole domain
    pub domain_size: i64,
    /// Caller-defined block tag passed to `set`
    pub block_index: i32,
}

impl Range1D {
    /// Number of indices in the job, saturating at `i64::MAX`
    pub fn len(&self) -> i64 {
        self.end.saturating_sub(self.begin).max(0)
    }

    /// True when the job covers no index
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices covered by the job
    pub fn indices(&self) -> std::ops::Range<i64> {
        self.begin..self.end
    }
}

/// Cuts `[begin, end)` into jobs of `step` indices.
///
/// # Example
///
/// ```rust
/// use range_thread_group::partition::{NextJob, RangePartition1D};
///
/// let mut partition = RangePartition1D::new(2);
/// partition.set(0, 10, 3, Some(2), 0);
///
/// let mut jobs = Vec::new();
/// while let Some(range) = partition.next_job(0) {
///     jobs.push((range.begin, range.end));
/// }
/// assert_eq!(jobs, vec![(0, 3), (3, 6), (6, 9), (9, 10)]);
/// ```
#[derive(Debug, Clone)]
pub struct RangePartition1D {
    ranges: Vec<Range1D>,
    begin: i64,
    end: i64,
    step: i64,
    num: i64,
    cur: i64,
    used: usize,
}

impl RangePartition1D {
    /// Create a partitioner with one range record per worker
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        Self {
            ranges: vec![Range1D::default(); worker_count],
            begin: 0,
            end: 0,
            step: 1,
            num: 0,
            cur: 0,
            used: worker_count,
        }
    }

    /// Define the domain for the next run.
    ///
    /// A `step` of zero or less picks the step adaptively from the domain
    /// length and the used worker count. An empty or inverted domain yields
    /// no jobs.
    pub fn set(
        &mut self,
        begin: i64,
        end: i64,
        step: i64,
        used_workers: Option<usize>,
        block_index: i32,
    ) {
        self.used = clamp_used_workers(used_workers, self.ranges.len());
        self.begin = begin;
        self.end = end;

        let width = span(begin, end);
        let len = narrow(width);
        self.step = resolve_step(step, len, self.used);
        self.num = job_count(width, self.step);
        self.cur = 0;

        for range in self.ranges.iter_mut().take(self.used) {
            range.domain_size = len;
            range.block_index = block_index;
        }
    }

    /// Define `[begin, end)` with an adaptive step over all workers
    pub fn set_range(&mut self, begin: i64, end: i64) {
        self.set(begin, end, 0, None, 0);
    }

    /// Approximate completed fraction.
    ///
    /// Jobs still checked out by the used workers are not counted, so this
    /// stays below 1 until the owner has gathered the run.
    pub fn done(&self) -> f64 {
        if self.num == 0 {
            return 0.0;
        }
        (self.cur - self.used as i64).max(0) as f64 / self.num as f64
    }

    /// Last range handed to each worker
    pub fn ranges(&self) -> &[Range1D] {
        &self.ranges
    }

    /// Last range handed to `worker`
    pub fn range(&self, worker: usize) -> Option<&Range1D> {
        self.ranges.get(worker)
    }

    /// Number of worker records
    pub fn worker_count(&self) -> usize {
        self.ranges.len()
    }

    /// Worker count the current domain was sized for
    pub fn used_worker_count(&self) -> usize {
        self.used
    }

    /// Total number of jobs
    pub fn num(&self) -> i64 {
        self.num
    }

    /// Number of jobs handed out so far
    pub fn cur(&self) -> i64 {
        self.cur
    }

    /// Job length
    pub fn step(&self) -> i64 {
        self.step
    }

    /// Domain start
    pub fn begin(&self) -> i64 {
        self.begin
    }

    /// Domain end
    pub fn end(&self) -> i64 {
        self.end
    }
}

impl NextJob for RangePartition1D {
    type Job = Range1D;

    fn worker_slots(&self) -> Option<usize> {
        Some(self.ranges.len())
    }

    /// # Panics
    ///
    /// Panics if `worker` is not below the worker count given to `new`.
    fn next_job(&mut self, worker: usize) -> Option<Range1D> {
        if self.cur >= self.num {
            return None;
        }

        let (begin, end) = job_bounds(self.begin, self.end, self.step, self.cur);

        let range = &mut self.ranges[worker];
        range.begin = begin;
        range.end = end;
        self.cur += 1;

        Some(*range)
    }
}
