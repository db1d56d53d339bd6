//! Two-dimensional range partitioner

use super::{clamp_used_workers, job_bounds, job_count, narrow, resolve_step, span, NextJob};
use serde::{Deserialize, Serialize};

/// A `[x_begin, x_end) x [y_begin, y_end)` block of a 2D domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range2D {
    /// First column of the block
    pub x_begin: i64,
    /// One past the last column
    pub x_end: i64,
    /// First row of the block
    pub y_begin: i64,
    /// One past the last row
    pub y_end: i64,
    /// Width of the whole domain
    pub x_domain_size: i64,
    /// Height of the whole domain
    pub y_domain_size: i64,
    /// Caller-defined block tag passed to `set`
    pub block_index: i32,
}

impl Range2D {
    /// Block width
    pub fn width(&self) -> i64 {
        self.x_end.saturating_sub(self.x_begin).max(0)
    }

    /// Block height
    pub fn height(&self) -> i64 {
        self.y_end.saturating_sub(self.y_begin).max(0)
    }

    /// Number of cells in the block, saturating at `i64::MAX`
    pub fn area(&self) -> i64 {
        self.width().saturating_mul(self.height())
    }

    /// True when the block covers no cell
    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }
}

/// Cuts a 2D domain into blocks of `x_step` by `y_step`, handed out row-major.
#[derive(Debug, Clone)]
pub struct RangePartition2D {
    ranges: Vec<Range2D>,
    x_begin: i64,
    x_end: i64,
    y_begin: i64,
    y_end: i64,
    x_step: i64,
    y_step: i64,
    x_num: i64,
    y_num: i64,
    x_cur: i64,
    y_cur: i64,
    num: i64,
    cur: i64,
    used: usize,
}

impl RangePartition2D {
    /// Create a partitioner with one range record per worker
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        Self {
            ranges: vec![Range2D::default(); worker_count],
            x_begin: 0,
            x_end: 0,
            y_begin: 0,
            y_end: 0,
            x_step: 1,
            y_step: 1,
            x_num: 0,
            y_num: 0,
            x_cur: 0,
            y_cur: 0,
            num: 0,
            cur: 0,
            used: worker_count,
        }
    }

    /// Define the domain for the next run.
    ///
    /// Steps of zero or less are picked adaptively per axis. When only
    /// `y_step` is left at zero it follows an explicit `x_step`.
    #[allow(clippy::too_many_arguments)]
    pub fn set(
        &mut self,
        x_begin: i64,
        x_end: i64,
        y_begin: i64,
        y_end: i64,
        x_step: i64,
        y_step: i64,
        used_workers: Option<usize>,
        block_index: i32,
    ) {
        self.used = clamp_used_workers(used_workers, self.ranges.len());
        self.x_begin = x_begin;
        self.x_end = x_end;
        self.y_begin = y_begin;
        self.y_end = y_end;

        let x_span = span(x_begin, x_end);
        let y_span = span(y_begin, y_end);
        let x_len = narrow(x_span);
        let y_len = narrow(y_span);
        let y_step = if y_step <= 0 && x_step > 0 {
            x_step
        } else {
            y_step
        };

        self.x_step = resolve_step(x_step, x_len, self.used);
        self.y_step = resolve_step(y_step, y_len, self.used);
        self.x_num = job_count(x_span, self.x_step);
        self.y_num = job_count(y_span, self.y_step);
        self.num = self.x_num.saturating_mul(self.y_num);
        self.x_cur = 0;
        self.y_cur = 0;
        self.cur = 0;

        for range in self.ranges.iter_mut().take(self.used) {
            range.x_domain_size = x_len;
            range.y_domain_size = y_len;
            range.block_index = block_index;
        }
    }

    /// Define a grid with adaptive steps over all workers
    pub fn set_grid(&mut self, x_begin: i64, x_end: i64, y_begin: i64, y_end: i64) {
        self.set(x_begin, x_end, y_begin, y_end, 0, 0, None, 0);
    }

    /// Approximate completed fraction, same discounting as the 1D partitioner
    pub fn done(&self) -> f64 {
        if self.num == 0 {
            return 0.0;
        }
        (self.cur - self.used as i64).max(0) as f64 / self.num as f64
    }

    /// Last block handed to each worker
    pub fn ranges(&self) -> &[Range2D] {
        &self.ranges
    }

    /// Last block handed to `worker`
    pub fn range(&self, worker: usize) -> Option<&Range2D> {
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

    /// Total number of blocks
    pub fn num(&self) -> i64 {
        self.num
    }

    /// Number of blocks handed out so far
    pub fn cur(&self) -> i64 {
        self.cur
    }

    /// Block width and height
    pub fn steps(&self) -> (i64, i64) {
        (self.x_step, self.y_step)
    }

    /// Blocks per row and per column
    pub fn counts(&self) -> (i64, i64) {
        (self.x_num, self.y_num)
    }
}

impl NextJob for RangePartition2D {
    type Job = Range2D;

    fn worker_slots(&self) -> Option<usize> {
        Some(self.ranges.len())
    }

    /// # Panics
    ///
    /// Panics if `worker` is not below the worker count given to `new`.
    fn next_job(&mut self, worker: usize) -> Option<Range2D> {
        if self.cur >= self.num {
            return None;
        }

        let (x_begin, x_end) = job_bounds(self.x_begin, self.x_end, self.x_step, self.x_cur);
        let (y_begin, y_end) = job_bounds(self.y_begin, self.y_end, self.y_step, self.y_cur);

        let range = &mut self.ranges[worker];
        range.x_begin = x_begin;
        range.x_end = x_end;
        range.y_begin = y_begin;
        range.y_end = y_end;

        if self.x_cur >= self.x_num - 1 {
            self.x_cur = 0;
            self.y_cur += 1;
        } else {
            self.x_cur += 1;
        }
        self.cur += 1;

        Some(*range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(partition: &mut RangePartition2D) -> Vec<(i64, i64, i64, i64)> {
        let mut blocks = Vec::new();
        while let Some(r) = partition.next_job(0) {
            blocks.push((r.x_begin, r.x_end, r.y_begin, r.y_end));
        }
        blocks
    }

    #[test]
    fn test_row_major_order() {
        let mut partition = RangePartition2D::new(2);
        partition.set(0, 5, 0, 4, 2, 2, None, 0);

        assert_eq!(partition.counts(), (3, 2));
        assert_eq!(partition.num(), 6);
        assert_eq!(
            drain(&mut partition),
            vec![
                (0, 2, 0, 2),
                (2, 4, 0, 2),
                (4, 5, 0, 2),
                (0, 2, 2, 4),
                (2, 4, 2, 4),
                (4, 5, 2, 4),
            ]
        );
        assert!(partition.next_job(1).is_none());
    }

    #[test]
    fn test_y_step_follows_x_step() {
        let mut partition = RangePartition2D::new(4);
        partition.set(0, 64, 0, 64, 16, 0, None, 0);
        assert_eq!(partition.steps(), (16, 16));
        assert_eq!(partition.num(), 16);
    }

    #[test]
    fn test_adaptive_steps_per_axis() {
        let mut partition = RangePartition2D::new(4);
        partition.set_grid(0, 100, 0, 20_000);
        assert_eq!(partition.steps(), (25, 1_250));
        assert_eq!(partition.counts(), (4, 16));
    }

    #[test]
    fn test_explicit_y_with_adaptive_x() {
        let mut partition = RangePartition2D::new(2);
        partition.set(0, 10, 0, 10, 0, 3, None, 0);
        assert_eq!(partition.steps(), (5, 3));
        assert_eq!(partition.counts(), (2, 4));
    }

    #[test]
    fn test_single_column() {
        let mut partition = RangePartition2D::new(1);
        partition.set(0, 1, 0, 3, 1, 1, None, 0);
        assert_eq!(
            drain(&mut partition),
            vec![(0, 1, 0, 1), (0, 1, 1, 2), (0, 1, 2, 3)]
        );
    }

    #[test]
    fn test_covers_every_cell_once() {
        let (width, height) = (37i64, 23i64);
        let mut partition = RangePartition2D::new(3);
        partition.set(0, width, 0, height, 5, 4, None, 0);

        let mut hits = vec![0u8; (width * height) as usize];
        let mut visited = 0;
        while let Some(r) = partition.next_job(visited % 3) {
            for y in r.y_begin..r.y_end {
                for x in r.x_begin..r.x_end {
                    hits[(y * width + x) as usize] += 1;
                }
            }
            visited += 1;
        }

        assert_eq!(visited as i64, partition.num());
        assert!(hits.iter().all(|&h| h == 1));
    }

    #[test]
    fn test_empty_axis_yields_nothing() {
        let mut partition = RangePartition2D::new(2);
        partition.set(0, 10, 4, 4, 0, 0, None, 0);
        assert_eq!(partition.num(), 0);
        assert!(partition.next_job(0).is_none());
        assert_eq!(partition.done(), 0.0);
    }

    #[test]
    fn test_steps_larger_than_headroom() {
        let mut partition = RangePartition2D::new(1);
        partition.set(0, 10, 0, 10, i64::MAX, i64::MAX, None, 0);
        assert_eq!(partition.counts(), (1, 1));
        assert_eq!(drain(&mut partition), vec![(0, 10, 0, 10)]);

        partition.set(i64::MAX - 5, i64::MAX, i64::MAX - 2, i64::MAX, 3, 0, None, 0);
        assert_eq!(partition.steps(), (3, 3));
        assert_eq!(
            drain(&mut partition),
            vec![
                (i64::MAX - 5, i64::MAX - 2, i64::MAX - 2, i64::MAX),
                (i64::MAX - 2, i64::MAX, i64::MAX - 2, i64::MAX),
            ]
        );
    }

    #[test]
    fn test_full_i64_axis() {
        let mut partition = RangePartition2D::new(1);
        partition.set(i64::MIN, i64::MAX, 0, 2, 0, 1, None, 0);
        assert_eq!(partition.counts(), (2048, 2));
        assert_eq!(partition.num(), 4096);
        assert_eq!(partition.ranges()[0].x_domain_size, i64::MAX);

        let blocks = drain(&mut partition);
        assert_eq!(blocks.len(), 4096);
        assert_eq!(blocks[0].0, i64::MIN);
        assert_eq!(blocks[2047].1, i64::MAX);
        assert_eq!(blocks[2048], (i64::MIN, i64::MIN + (1 << 53), 1, 2));

        let wide = Range2D {
            x_begin: i64::MIN,
            x_end: i64::MAX,
            y_begin: 0,
            y_end: 4,
            ..Default::default()
        };
        assert_eq!(wide.width(), i64::MAX);
        assert_eq!(wide.area(), i64::MAX);
    }

    #[test]
    fn test_records_and_done() {
        let mut partition = RangePartition2D::new(2);
        partition.set(0, 4, 0, 4, 2, 2, Some(2), 5);

        let first = partition.next_job(1).expect("first block");
        assert_eq!(first.area(), 4);
        assert_eq!(partition.range(1), Some(&first));
        assert_eq!(first.x_domain_size, 4);
        assert_eq!(first.block_index, 5);

        partition.next_job(0);
        partition.next_job(1);
        assert!((partition.done() - 0.25).abs() < f64::EPSILON);
    }
}
