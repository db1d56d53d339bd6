//! Tracing integration for observability.
//!
//! With the `tracing` feature enabled, every worker enters a `worker` span
//! for its lifetime and the group emits the events below, which metrics
//! collectors (e.g. tracing-opentelemetry) can turn into counters and
//! histograms.
//!
//! # Example
//!
//! ```rust,ignore
//! use range_thread_group::prelude::*;
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env()
//!         .add_directive("range_thread_group=trace".parse().unwrap()))
//!     .init();
//!
//! let group = ThreadGroup::with_workers(4)?;
//! group.create()?;
//! group.run_range_1d(0, 1 << 20, |range, _worker| Ok(()))?;
//! ```

/// Metrics recording functions for observability.
#[cfg(feature = "tracing")]
pub mod metrics {
    use std::time::Duration;

    /// Records the start of a run.
    #[inline]
    pub fn record_run_start(used_workers: usize) {
        tracing::debug!(
            counter.runs_started = 1,
            used_workers = used_workers,
            "run started"
        );
    }

    /// Records a finished work-stealing job with timing.
    #[inline]
    pub fn record_job(duration: Duration, success: bool) {
        let duration_ms = duration.as_millis() as u64;
        if success {
            tracing::trace!(
                counter.jobs_completed = 1,
                histogram.job_duration_ms = duration_ms,
                "job completed"
            );
        } else {
            tracing::trace!(
                counter.jobs_failed = 1,
                histogram.job_duration_ms = duration_ms,
                "job failed"
            );
        }
    }

    /// Records a fault merged into the exception record.
    #[inline]
    pub fn record_fault(worker_id: usize, mask: u32) {
        tracing::warn!(
            counter.faults = 1,
            worker_id = worker_id,
            mask = mask,
            "fault recorded"
        );
    }

    /// Records worker becoming busy.
    #[inline]
    pub fn record_worker_busy(worker_id: usize) {
        tracing::trace!(
            gauge.workers_busy = 1,
            worker_id = worker_id,
            "worker busy"
        );
    }

    /// Records worker becoming idle.
    #[inline]
    pub fn record_worker_idle(worker_id: usize) {
        tracing::trace!(
            gauge.workers_busy = -1i64,
            worker_id = worker_id,
            "worker idle"
        );
    }
}

#[cfg(all(test, feature = "tracing"))]
mod tests {
    use super::metrics;
    use std::time::Duration;

    #[test]
    fn test_metrics_without_subscriber() {
        metrics::record_run_start(4);
        metrics::record_job(Duration::from_millis(3), true);
        metrics::record_job(Duration::from_millis(3), false);
        metrics::record_fault(1, 2);
        metrics::record_worker_busy(0);
        metrics::record_worker_idle(0);
    }
}
