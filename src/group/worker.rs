//! Worker threads and per-run dispatch

use crate::core::{Event, ExceptionRecord, Fault, Result, ThreadError};
use crate::partition::NextJob;
use core_affinity::CoreId;
use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[cfg(feature = "tracing")]
use tracing::{debug, span, Level};

/// State guarded by the bucket lock
pub(crate) struct Bucket {
    /// Set by stop/gathering; workers stop pulling jobs once they see it
    pub(crate) stop_requested: bool,
    pub(crate) exceptions: ExceptionRecord,
    /// Job source of the current work-stealing run
    pub(crate) source: Option<Box<dyn Any + Send>>,
}

/// State shared between the group owner and its workers
pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) bucket: Mutex<Bucket>,
    pub(crate) dispatch: RwLock<Option<Arc<dyn Dispatch>>>,
    pub(crate) terminate: AtomicBool,
    pub(crate) start_events: Vec<CachePadded<Event>>,
    pub(crate) stop_events: Vec<CachePadded<Event>>,
}

impl Shared {
    pub(crate) fn new(name: String, worker_count: usize) -> Self {
        Self {
            name,
            bucket: Mutex::new(Bucket {
                stop_requested: true,
                exceptions: ExceptionRecord::new(),
                source: None,
            }),
            dispatch: RwLock::new(None),
            terminate: AtomicBool::new(false),
            start_events: (0..worker_count)
                .map(|_| CachePadded::new(Event::new()))
                .collect(),
            stop_events: (0..worker_count)
                .map(|_| CachePadded::new(Event::new()))
                .collect(),
        }
    }

    /// Merge a fault raised by `worker` into the run's exception record
    pub(crate) fn record(&self, worker: usize, fault: Fault) {
        self.report(worker, "job", &fault);
        self.bucket.lock().exceptions.merge(fault);
    }

    /// Log and count a fault before it is merged
    fn report(&self, worker: usize, stage: &str, fault: &Fault) {
        log::warn!("{}-{}: {}: {}", self.name, worker, stage, fault);
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_fault(worker, fault.mask().bits());
    }
}

/// What a signaled worker does during one run
pub(crate) trait Dispatch: Send + Sync {
    fn run(&self, shared: &Shared, worker: usize);
}

/// Each used worker calls `execute` exactly once
pub(crate) struct SimpleDispatch<E> {
    execute: E,
}

impl<E> SimpleDispatch<E>
where
    E: Fn(usize) -> std::result::Result<(), Fault> + Send + Sync,
{
    pub(crate) fn new(execute: E) -> Self {
        Self { execute }
    }
}

impl<E> Dispatch for SimpleDispatch<E>
where
    E: Fn(usize) -> std::result::Result<(), Fault> + Send + Sync,
{
    fn run(&self, shared: &Shared, worker: usize) {
        match catch_unwind(AssertUnwindSafe(|| (self.execute)(worker))) {
            Ok(Ok(())) => {}
            Ok(Err(fault)) => shared.record(worker, fault),
            Err(payload) => shared.record(worker, Fault::from_panic(payload)),
        }
    }
}

/// Workers pull jobs from the shared source `S` until it runs dry
pub(crate) struct StealingDispatch<S, E> {
    execute: E,
    _source: PhantomData<fn() -> S>,
}

impl<S, E> StealingDispatch<S, E>
where
    S: NextJob,
    E: Fn(S::Job, usize) -> std::result::Result<(), Fault> + Send + Sync,
{
    pub(crate) fn new(execute: E) -> Self {
        Self {
            execute,
            _source: PhantomData,
        }
    }

    /// Claim the next job under the bucket lock
    fn poll(shared: &Shared, worker: usize) -> Option<S::Job> {
        let mut bucket = shared.bucket.lock();
        if bucket.stop_requested || !bucket.exceptions.is_empty() {
            return None;
        }

        let source = bucket.source.as_mut()?.downcast_mut::<S>()?;
        match catch_unwind(AssertUnwindSafe(|| source.next_job(worker))) {
            Ok(job) => job,
            Err(payload) => {
                let fault = Fault::from_panic(payload);
                shared.report(worker, "next job", &fault);
                bucket.exceptions.merge(fault);
                None
            }
        }
    }
}

impl<S, E> Dispatch for StealingDispatch<S, E>
where
    S: NextJob,
    E: Fn(S::Job, usize) -> std::result::Result<(), Fault> + Send + Sync,
{
    fn run(&self, shared: &Shared, worker: usize) {
        while let Some(job) = Self::poll(shared, worker) {
            #[cfg(feature = "tracing")]
            let start = std::time::Instant::now();

            let outcome = catch_unwind(AssertUnwindSafe(|| (self.execute)(job, worker)));

            #[cfg(feature = "tracing")]
            crate::tracing::metrics::record_job(start.elapsed(), matches!(outcome, Ok(Ok(()))));

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(fault)) => {
                    shared.record(worker, fault);
                    break;
                }
                Err(payload) => {
                    shared.record(worker, Fault::from_panic(payload));
                    break;
                }
            }
        }
    }
}

/// A long-lived worker thread of a thread group
#[derive(Debug)]
pub struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    /// Spawn worker `id`; it blocks on its start event right away
    pub(crate) fn spawn(id: usize, shared: Arc<Shared>, core: Option<CoreId>) -> Result<Self> {
        let thread = thread::Builder::new()
            .name(format!("{}-{}", shared.name, id))
            .spawn(move || {
                if let Some(core) = core {
                    if !core_affinity::set_for_current(core) {
                        log::warn!("{}-{}: failed to pin to core {}", shared.name, id, core.id);
                    }
                }
                Self::run(id, &shared);
            })
            .map_err(|e| ThreadError::spawn_with_source(id, "Cannot create worker thread", e))?;

        Ok(Self {
            id,
            thread: Some(thread),
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Join the worker thread
    pub fn join(mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| ThreadError::join(self.id, "Worker panicked"))?;
        }
        Ok(())
    }

    /// Main worker loop: wait for the start signal, run the current
    /// dispatch, signal stop. Exits when woken with the terminate flag set.
    fn run(id: usize, shared: &Shared) {
        #[cfg(feature = "tracing")]
        let worker_span = span!(Level::DEBUG, "worker", group = %shared.name, id = id);
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        let start = &shared.start_events[id];
        let stop = &shared.stop_events[id];

        loop {
            start.wait();

            if shared.terminate.load(Ordering::Acquire) {
                #[cfg(feature = "tracing")]
                debug!("worker exiting");
                stop.set();
                break;
            }

            let dispatch = shared.dispatch.read().clone();
            if let Some(dispatch) = dispatch {
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_worker_busy(id);

                dispatch.run(shared, id);

                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_worker_idle(id);
            }

            stop.set();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExceptionMask;
    use crate::partition::{Range1D, RangePartition1D};
    use std::sync::atomic::AtomicUsize;

    fn shared(workers: usize) -> Arc<Shared> {
        Arc::new(Shared::new("test".to_string(), workers))
    }

    #[test]
    fn test_simple_dispatch_records_fault() {
        let shared = shared(1);
        let dispatch = SimpleDispatch::new(|_worker| Err(Fault::memory("tile 4")));

        dispatch.run(&shared, 0);

        let bucket = shared.bucket.lock();
        assert_eq!(bucket.exceptions.mask(), ExceptionMask::MEMORY);
        assert_eq!(bucket.exceptions.source(), "tile 4");
    }

    #[test]
    fn test_stealing_dispatch_drains_source() {
        let shared = shared(1);
        let mut partition = RangePartition1D::new(1);
        partition.set(0, 100, 7, None, 0);
        {
            let mut bucket = shared.bucket.lock();
            bucket.stop_requested = false;
            bucket.source = Some(Box::new(partition));
        }

        let total = Arc::new(AtomicUsize::new(0));
        let total_clone = Arc::clone(&total);
        let dispatch = StealingDispatch::<RangePartition1D, _>::new(move |range: Range1D, _worker| {
            total_clone.fetch_add(range.len() as usize, Ordering::Relaxed);
            Ok(())
        });

        dispatch.run(&shared, 0);
        assert_eq!(total.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn test_stealing_dispatch_stops_after_fault() {
        let shared = shared(1);
        let mut partition = RangePartition1D::new(1);
        partition.set(0, 10, 1, None, 0);
        {
            let mut bucket = shared.bucket.lock();
            bucket.stop_requested = false;
            bucket.source = Some(Box::new(partition));
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let dispatch = StealingDispatch::<RangePartition1D, _>::new(move |range: Range1D, _worker| {
            calls_clone.fetch_add(1, Ordering::Relaxed);
            if range.begin == 2 {
                panic!("bad sample");
            }
            Ok(())
        });

        dispatch.run(&shared, 0);
        assert_eq!(calls.load(Ordering::Relaxed), 3);

        let bucket = shared.bucket.lock();
        assert!(bucket.exceptions.is_undefined());
        assert_eq!(bucket.exceptions.source(), "bad sample");
    }

    struct Overrun;

    impl NextJob for Overrun {
        type Job = usize;

        fn next_job(&mut self, _worker: usize) -> Option<usize> {
            Fault::memory("cursor overrun").raise()
        }
    }

    #[test]
    fn test_next_job_fault_is_recorded() {
        let shared = shared(1);
        {
            let mut bucket = shared.bucket.lock();
            bucket.stop_requested = false;
            bucket.source = Some(Box::new(Overrun));
        }

        let dispatch = StealingDispatch::<Overrun, _>::new(|_job: usize, _worker| {
            panic!("no job is handed out");
        });
        dispatch.run(&shared, 0);

        let bucket = shared.bucket.lock();
        assert_eq!(bucket.exceptions.mask(), ExceptionMask::MEMORY);
        assert_eq!(bucket.exceptions.source(), "cursor overrun");
    }

    #[test]
    fn test_stealing_dispatch_respects_stop_flag() {
        let shared = shared(1);
        let mut partition = RangePartition1D::new(1);
        partition.set(0, 10, 1, None, 0);
        shared.bucket.lock().source = Some(Box::new(partition));

        let dispatch = StealingDispatch::<RangePartition1D, _>::new(|_range: Range1D, _worker| {
            panic!("must not run while stopped");
        });

        dispatch.run(&shared, 0);
        assert!(shared.bucket.lock().exceptions.is_empty());
    }

    #[test]
    fn test_worker_runs_and_exits() {
        let shared = shared(1);
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        *shared.dispatch.write() = Some(Arc::new(SimpleDispatch::new(move |_worker| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })));

        let worker = Worker::spawn(0, Arc::clone(&shared), None).expect("Failed to spawn worker");
        assert_eq!(worker.id(), 0);

        shared.start_events[0].set();
        shared.stop_events[0].wait();
        shared.start_events[0].set();
        shared.stop_events[0].wait();
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        shared.terminate.store(true, Ordering::Release);
        shared.start_events[0].set();
        shared.stop_events[0].wait();
        worker.join().expect("Failed to join worker");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
