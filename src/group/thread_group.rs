//! Thread group implementation

use crate::core::{ExceptionMask, ExceptionRecord, Fault, Result, ThreadError};
use crate::group::config::ThreadGroupConfig;
use crate::group::status::GatherStatus;
use crate::group::worker::{Dispatch, Shared, SimpleDispatch, StealingDispatch, Worker};
use crate::partition::{
    clamp_used_workers, from_fn, NextJob, Range1D, Range2D, RangePartition1D, RangePartition2D,
};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A fixed set of persistent worker threads that repeatedly share out runs.
///
/// # Life cycle
///
/// [`ThreadGroup::new`] only allocates; [`ThreadGroup::create`] spawns the
/// workers, which then park on their start events. Each run is a `start*`
/// call followed by [`ThreadGroup::gathering`] (or [`ThreadGroup::stop`]);
/// the same threads serve every run. Dropping the group terminates it.
///
/// # Run modes
///
/// - **Simple**: [`ThreadGroup::start_simple`] calls the execute closure once
///   on each used worker.
/// - **Work stealing**: [`ThreadGroup::start`] moves a [`NextJob`] source into
///   the group. Workers claim jobs from it one at a time under the bucket
///   lock and run them unlocked, so faster workers claim more jobs.
///
/// Failures never unwind past a worker. A [`Fault`] returned or raised by a
/// job, or any panic, is merged into the group's [`ExceptionRecord`] and read
/// back through the gathering status and [`ThreadGroup::exception_source`].
///
/// # Example
///
/// ```rust
/// use range_thread_group::prelude::*;
/// use std::sync::atomic::{AtomicI64, Ordering};
/// use std::sync::Arc;
///
/// # fn main() -> Result<()> {
/// let group = ThreadGroup::with_workers(4)?;
/// group.create()?;
///
/// let mut partition = RangePartition1D::new(group.worker_count());
/// partition.set_range(0, 1000);
///
/// let sum = Arc::new(AtomicI64::new(0));
/// let sum_clone = Arc::clone(&sum);
/// group.start(partition, move |range: Range1D, _worker| {
///     sum_clone.fetch_add(range.indices().sum::<i64>(), Ordering::Relaxed);
///     Ok(())
/// }, None)?;
///
/// assert_eq!(group.gathering(), GatherStatus::Success);
/// assert_eq!(sum.load(Ordering::Relaxed), 499_500);
/// # Ok(())
/// # }
/// ```
pub struct ThreadGroup {
    config: ThreadGroupConfig,
    shared: Arc<Shared>,
    workers: Mutex<Vec<Worker>>,
    /// Used workers whose stop event has not been consumed yet
    pending: Mutex<Vec<usize>>,
    created: AtomicBool,
    stopped: AtomicBool,
    used: AtomicUsize,
}

impl std::fmt::Debug for ThreadGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadGroup")
            .field("config", &self.config)
            .field("created", &self.is_created())
            .field("stopped", &self.is_stopped())
            .field("used", &self.used_worker_count())
            .finish()
    }
}

impl ThreadGroup {
    /// Create a thread group with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ThreadGroupConfig::default())
    }

    /// Create a thread group with the given number of workers
    pub fn with_workers(worker_count: usize) -> Result<Self> {
        Self::with_config(ThreadGroupConfig::new(worker_count))
    }

    /// Create a thread group with custom configuration.
    ///
    /// No thread is spawned until [`ThreadGroup::create`].
    pub fn with_config(config: ThreadGroupConfig) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared::new(config.name.clone(), config.worker_count));
        let used = config.worker_count;
        Ok(Self {
            config,
            shared,
            workers: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            created: AtomicBool::new(false),
            stopped: AtomicBool::new(true),
            used: AtomicUsize::new(used),
        })
    }

    /// Spawn the worker threads.
    ///
    /// # Errors
    ///
    /// - `ThreadError::AlreadyCreated` - the workers are already running
    /// - `ThreadError::SpawnError` - a thread could not be spawned; the ones
    ///   spawned before it are torn down again
    pub fn create(&self) -> Result<()> {
        let mut workers = self.workers.lock();
        if self.created.load(Ordering::Acquire) {
            return Err(ThreadError::already_created(
                &self.config.name,
                self.config.worker_count,
            ));
        }

        let cores = self.config.affinity.and_then(|first| {
            let cores = core_affinity::get_core_ids().filter(|ids| !ids.is_empty());
            if cores.is_none() {
                log::warn!(
                    "{}: no core ids available, ignoring affinity {}",
                    self.config.name,
                    first
                );
            }
            cores.map(|ids| (first, ids))
        });

        for id in 0..self.config.worker_count {
            let core = cores
                .as_ref()
                .map(|(first, ids)| ids[first.wrapping_add(id) % ids.len()]);

            match Worker::spawn(id, Arc::clone(&self.shared), core) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    let spawned = std::mem::take(&mut *workers);
                    if let Err(join_err) = self.shutdown_workers(spawned) {
                        log::error!("{}: {}", self.config.name, join_err);
                    }
                    return Err(e);
                }
            }
        }

        self.created.store(true, Ordering::Release);
        log::debug!(
            "{}: created {} workers",
            self.config.name,
            self.config.worker_count
        );
        Ok(())
    }

    /// Start a simple run: `execute(worker)` is called once on each used worker.
    ///
    /// Returns immediately; use [`ThreadGroup::gathering`] to wait.
    pub fn start_simple<E>(&self, execute: E, used_workers: Option<usize>) -> Result<()>
    where
        E: Fn(usize) -> std::result::Result<(), Fault> + Send + Sync + 'static,
    {
        self.start_dispatch(Arc::new(SimpleDispatch::new(execute)), None, used_workers)
    }

    /// Start a work-stealing run over `source`.
    ///
    /// The source is moved into the group for the duration of the run; get
    /// it back with [`ThreadGroup::take_source`] once the run is stopped.
    ///
    /// # Errors
    ///
    /// - `ThreadError::NotCreated` / `ThreadError::AlreadyRunning`
    /// - `ThreadError::SourceMismatch` - the source keeps fewer per-worker
    ///   records than the run uses workers
    pub fn start<S, E>(&self, source: S, execute: E, used_workers: Option<usize>) -> Result<()>
    where
        S: NextJob,
        E: Fn(S::Job, usize) -> std::result::Result<(), Fault> + Send + Sync + 'static,
    {
        let used = clamp_used_workers(used_workers, self.config.worker_count);
        if let Some(slots) = source.worker_slots() {
            if slots < used {
                return Err(ThreadError::source_mismatch(slots, used));
            }
        }

        self.start_dispatch(
            Arc::new(StealingDispatch::<S, E>::new(execute)),
            Some(Box::new(source) as Box<dyn Any + Send>),
            used_workers,
        )
    }

    /// Start a work-stealing run whose jobs come from the closure `next`
    pub fn start_fn<F, J, E>(&self, next: F, execute: E, used_workers: Option<usize>) -> Result<()>
    where
        F: FnMut(usize) -> Option<J> + Send + 'static,
        J: Send + 'static,
        E: Fn(J, usize) -> std::result::Result<(), Fault> + Send + Sync + 'static,
    {
        self.start(from_fn(next), execute, used_workers)
    }

    fn start_dispatch(
        &self,
        dispatch: Arc<dyn Dispatch>,
        source: Option<Box<dyn Any + Send>>,
        used_workers: Option<usize>,
    ) -> Result<()> {
        if !self.is_created() {
            return Err(ThreadError::not_created(&self.config.name));
        }

        let mut pending = self.pending.lock();
        if !pending.is_empty() {
            return Err(ThreadError::already_running(
                &self.config.name,
                self.used_worker_count(),
            ));
        }

        let used = clamp_used_workers(used_workers, self.config.worker_count);
        {
            let mut bucket = self.shared.bucket.lock();
            bucket.stop_requested = false;
            bucket.exceptions.reset();
            bucket.source = source;
        }
        *self.shared.dispatch.write() = Some(dispatch);

        self.used.store(used, Ordering::Release);
        self.stopped.store(false, Ordering::Release);
        pending.extend(0..used);

        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_run_start(used);
        log::debug!("{}: starting run on {} workers", self.config.name, used);

        for event in &self.shared.start_events[..used] {
            event.set();
        }
        Ok(())
    }

    /// Ask the current run to stop and wait for every used worker.
    ///
    /// Jobs already claimed run to completion; no further job is handed out.
    /// No-op if the group is not created or no run is in flight.
    pub fn stop(&self) {
        if !self.is_created() {
            return;
        }

        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return;
        }

        self.shared.bucket.lock().stop_requested = true;
        for worker in pending.drain(..) {
            self.shared.stop_events[worker].wait();
        }
        self.stopped.store(true, Ordering::Release);
    }

    /// Wait for every used worker to finish the current run.
    ///
    /// Returns [`GatherStatus::Failed`] if the group is not created or an
    /// undefined fault was recorded, [`GatherStatus::Exception`] if any other
    /// fault was recorded.
    pub fn gathering(&self) -> GatherStatus {
        self.gather(None)
    }

    /// Wait up to `timeout` for the current run.
    ///
    /// On [`GatherStatus::TimedOut`] the run stays in flight; call again, or
    /// [`ThreadGroup::stop`] to drain it.
    pub fn gathering_timeout(&self, timeout: Duration) -> GatherStatus {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.gather(Some(deadline)),
            None => self.gather(None),
        }
    }

    /// [`ThreadGroup::gathering`] mapped to a `Result`
    pub fn gathering_result(&self) -> Result<()> {
        let status = self.gathering();
        self.status_result(status, Duration::ZERO)
    }

    /// [`ThreadGroup::gathering_timeout`] mapped to a `Result`
    pub fn gathering_timeout_result(&self, timeout: Duration) -> Result<()> {
        let status = self.gathering_timeout(timeout);
        self.status_result(status, timeout)
    }

    fn gather(&self, deadline: Option<Instant>) -> GatherStatus {
        if !self.is_created() {
            return GatherStatus::Failed;
        }

        let mut pending = self.pending.lock();
        match deadline {
            None => {
                for worker in pending.drain(..) {
                    self.shared.stop_events[worker].wait();
                }
            }
            Some(deadline) => {
                let stop_events = &self.shared.stop_events;
                pending.retain(|&worker| !stop_events[worker].wait_until(deadline));
                if !pending.is_empty() {
                    return GatherStatus::TimedOut;
                }
            }
        }
        self.stopped.store(true, Ordering::Release);

        let mut bucket = self.shared.bucket.lock();
        bucket.stop_requested = true;
        GatherStatus::from_record(&bucket.exceptions)
    }

    fn status_result(&self, status: GatherStatus, timeout: Duration) -> Result<()> {
        match status {
            GatherStatus::Success => Ok(()),
            GatherStatus::TimedOut => Err(ThreadError::gather_timeout(timeout.as_millis() as u64)),
            GatherStatus::Failed if !self.is_created() => {
                Err(ThreadError::not_created(&self.config.name))
            }
            GatherStatus::Failed => Err(ThreadError::gather_failed(self.exception_source())),
            GatherStatus::Exception => Err(ThreadError::job_exception(
                self.exception_mask().bits(),
                self.exception_source(),
            )),
        }
    }

    /// Stop any run, wake every worker with the terminate flag and join them.
    ///
    /// No-op if the group is not created. Afterwards [`ThreadGroup::create`]
    /// may be called again.
    pub fn terminate(&self) -> Result<()> {
        if !self.is_created() {
            return Ok(());
        }

        self.stop();

        let _pending = self.pending.lock();
        let workers = std::mem::take(&mut *self.workers.lock());
        let result = self.shutdown_workers(workers);

        self.created.store(false, Ordering::Release);
        self.stopped.store(true, Ordering::Release);
        log::debug!("{}: terminated", self.config.name);
        result
    }

    /// Wake `workers` with the terminate flag set and join them all
    fn shutdown_workers(&self, workers: Vec<Worker>) -> Result<()> {
        self.shared.terminate.store(true, Ordering::Release);
        *self.shared.dispatch.write() = None;

        for worker in &workers {
            self.shared.start_events[worker.id()].set();
        }
        for worker in &workers {
            self.shared.stop_events[worker.id()].wait();
        }

        let mut result = Ok(());
        for worker in workers {
            if let Err(e) = worker.join() {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        self.shared.terminate.store(false, Ordering::Release);
        result
    }

    /// Run `execute` once on every worker and wait for it
    pub fn run_simple<E>(&self, execute: E) -> Result<()>
    where
        E: Fn(usize) -> std::result::Result<(), Fault> + Send + Sync + 'static,
    {
        self.start_simple(execute, None)?;
        self.gathering_result()
    }

    /// Drain `source` on all workers, wait, and hand the source back
    pub fn run<S, E>(&self, source: S, execute: E) -> Result<S>
    where
        S: NextJob,
        E: Fn(S::Job, usize) -> std::result::Result<(), Fault> + Send + Sync + 'static,
    {
        self.start(source, execute, None)?;
        let status = self.gathering();
        let source = self.take_source::<S>();
        self.status_result(status, Duration::ZERO)?;
        source.ok_or_else(|| ThreadError::other("job source was not returned"))
    }

    /// Split `[begin, end)` adaptively over all workers and run it
    pub fn run_range_1d<E>(&self, begin: i64, end: i64, execute: E) -> Result<()>
    where
        E: Fn(Range1D, usize) -> std::result::Result<(), Fault> + Send + Sync + 'static,
    {
        let mut partition = RangePartition1D::new(self.config.worker_count);
        partition.set_range(begin, end);
        self.run(partition, execute).map(|_| ())
    }

    /// Split a 2D grid adaptively over all workers and run it
    pub fn run_range_2d<E>(
        &self,
        x: std::ops::Range<i64>,
        y: std::ops::Range<i64>,
        execute: E,
    ) -> Result<()>
    where
        E: Fn(Range2D, usize) -> std::result::Result<(), Fault> + Send + Sync + 'static,
    {
        let mut partition = RangePartition2D::new(self.config.worker_count);
        partition.set_grid(x.start, x.end, y.start, y.end);
        self.run(partition, execute).map(|_| ())
    }

    /// Inspect the current job source under the bucket lock.
    ///
    /// Returns `None` if there is no source or it is not an `S`.
    pub fn with_source<S, R, F>(&self, f: F) -> Option<R>
    where
        S: 'static,
        F: FnOnce(&S) -> R,
    {
        let bucket = self.shared.bucket.lock();
        bucket.source.as_ref()?.downcast_ref::<S>().map(f)
    }

    /// Move the job source of the last run out of the group.
    ///
    /// Returns `None` while a run is in flight, if there is no source, or if
    /// it is not an `S`.
    pub fn take_source<S>(&self) -> Option<S>
    where
        S: 'static,
    {
        if !self.is_stopped() {
            return None;
        }

        let mut bucket = self.shared.bucket.lock();
        match bucket.source.take()?.downcast::<S>() {
            Ok(source) => Some(*source),
            Err(other) => {
                bucket.source = Some(other);
                None
            }
        }
    }

    /// Origin text of the last recorded fault, empty if none
    pub fn exception_source(&self) -> String {
        self.shared.bucket.lock().exceptions.source().to_string()
    }

    /// Exception bits accumulated by the current or last run
    pub fn exception_mask(&self) -> ExceptionMask {
        self.shared.bucket.lock().exceptions.mask()
    }

    /// Snapshot of the exception record
    pub fn exception_record(&self) -> ExceptionRecord {
        self.shared.bucket.lock().exceptions.clone()
    }

    /// True when no run is in flight
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// True once the workers are spawned
    pub fn is_created(&self) -> bool {
        self.created.load(Ordering::Acquire)
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    /// Number of workers taking part in the current or last run
    pub fn used_worker_count(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    /// Group name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Group configuration
    pub fn config(&self) -> &ThreadGroupConfig {
        &self.config
    }
}

impl Drop for ThreadGroup {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            log::error!(
                "Failed to terminate thread group '{}' during drop: {}",
                self.config.name,
                e
            );
        }
    }
}
