//! Thread-backed worker pool.
//!
//! This module defines the [`WorkerPool`] struct, which owns a fixed set of
//! OS threads that pull [`WorkItem`]s from a shared [`WorkQueue`] and report
//! each one on a [`ResultSender`]. Work distribution is entirely pull-based:
//! whichever worker is idle first takes the next item, so the pool size is
//! independent of the batch size.
//!
//! Shutdown is cooperative. [`WorkerPool::stop`] raises every worker's stop
//! flag and then joins each thread; a worker that is in the middle of an
//! item finishes it first.

use super::worker::{WorkerContext, WorkerSignals, WorkerState, worker_loop};
use crate::{
    channel::ResultSender,
    error::{Error, Result},
    item::{WorkItem, WorkerCount, WorkerId},
    processor::Processor,
    queue::WorkQueue,
};
use core::time::Duration;
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

/// Default wait for an item before an idle worker re-checks its stop flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Pool-owned bookkeeping for one worker thread.
#[derive(Debug)]
struct WorkerRecord {
    id: WorkerId,
    signals: Arc<WorkerSignals>,
    handle: Option<JoinHandle<()>>,
}

/// A fixed-size pool of worker threads draining a shared [`WorkQueue`].
///
/// The pool never resizes. Dropping a pool that was not stopped stops it.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<WorkerRecord>,
    stopped: bool,
}

impl WorkerPool {
    /// Spawns `count` workers and returns once all of them are running.
    ///
    /// Each worker gets a clone of `queue` and `results` and a shared handle
    /// to `processor`. Threads are named `postpool-worker-K`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a zero `poll_interval`, or
    /// [`Error::WorkerSpawn`] if the operating system refuses a thread. In the
    /// latter case the workers already started are stopped and joined before
    /// returning.
    pub fn start<P: Processor>(
        count: WorkerCount,
        poll_interval: Duration,
        queue: &WorkQueue<WorkItem>,
        results: &ResultSender,
        processor: Arc<P>,
    ) -> Result<Self> {
        if poll_interval.is_zero() {
            return Err(Error::Configuration {
                reason: "poll interval must be greater than 0".to_string(),
            });
        }

        let mut pool = Self {
            workers: Vec::with_capacity(count.get()),
            stopped: false,
        };

        for index in 1..=count.get() {
            let id = WorkerId(index);
            let signals = Arc::new(WorkerSignals::new());
            let ctx = WorkerContext {
                id,
                queue: queue.clone(),
                results: results.clone(),
                processor: Arc::clone(&processor),
                poll_interval,
                signals: Arc::clone(&signals),
            };

            let spawned = thread::Builder::new()
                .name(format!("postpool-{id}"))
                .spawn(move || worker_loop(ctx));

            match spawned {
                Ok(handle) => pool.workers.push(WorkerRecord {
                    id,
                    signals,
                    handle: Some(handle),
                }),
                Err(source) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Failed to spawn {id}: {source}");

                    // Join what we have; the spawn failure is the error worth
                    // reporting.
                    let _ = pool.stop();
                    return Err(Error::WorkerSpawn { worker: id, source });
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!("Started {} workers", pool.workers.len());

        Ok(pool)
    }

    /// Number of workers in the pool.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Whether [`stop`](Self::stop) has completed.
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Snapshot of every worker's current state.
    pub fn states(&self) -> Vec<(WorkerId, WorkerState)> {
        self.workers
            .iter()
            .map(|worker| (worker.id, worker.signals.state()))
            .collect()
    }

    /// Number of worker threads that have not yet terminated.
    pub fn live_threads(&self) -> usize {
        self.workers
            .iter()
            .filter(|worker| {
                worker
                    .handle
                    .as_ref()
                    .is_some_and(|handle| !handle.is_finished())
            })
            .count()
    }

    /// Stops every worker and waits for each thread to exit.
    ///
    /// - Raises every stop flag first, so idle workers exit in parallel.
    /// - Joins each thread. A worker busy with an item finishes it before
    ///   exiting, so this blocks for as long as the slowest in-flight item.
    ///
    /// Calling `stop` again after it returned is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerPanicked`] naming the first worker whose thread
    /// panicked. All threads are joined regardless.
    pub fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }

        // === Phase 1: Signal every worker ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Signalling {} workers to stop", self.workers.len());
        for worker in &self.workers {
            worker.signals.request_stop();
        }

        // === Phase 2: Join every worker ===
        let mut first_panic = None;
        for worker in &mut self.workers {
            let Some(handle) = worker.handle.take() else {
                continue;
            };
            if handle.join().is_err() {
                #[cfg(feature = "tracing")]
                tracing::error!("{} panicked", worker.id);
                first_panic.get_or_insert(worker.id);
            } else {
                #[cfg(feature = "tracing")]
                tracing::trace!("{} joined", worker.id);
            }
            // The thread is gone either way.
            worker.signals.set_state(WorkerState::Stopped);
        }

        self.stopped = true;

        #[cfg(feature = "tracing")]
        tracing::info!("Worker pool shutdown complete");

        match first_panic {
            Some(worker) => Err(Error::WorkerPanicked { worker }),
            None => Ok(()),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Err(_e) = self.stop() {
            #[cfg(feature = "tracing")]
            tracing::error!("Error stopping worker pool on drop: {_e}");
        }
    }
}
