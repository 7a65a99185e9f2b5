//! Batch driver: seed the queue, run the pool, drain results, shut down.

use crate::{
    channel::{WorkResult, result_channel},
    error::{Error, Result},
    item::{WorkItem, WorkerCount},
    pool::{DEFAULT_POLL_INTERVAL, WorkerPool},
    processor::Processor,
    queue::WorkQueue,
};
use core::time::Duration;
use std::{sync::Arc, time::Instant};

/// Runs one batch of items through a fresh [`WorkerPool`].
///
/// Every input is explicit: the worker count and the processor are given at
/// construction, the items at [`run`](Self::run). A coordinator can run any
/// number of batches; each run builds and tears down its own queue, result
/// channel, and pool.
///
/// The drain loop has no timeout. An item whose processor never returns
/// blocks the run; bound the processor itself (for example with
/// [`CommandProcessor::with_timeout`](crate::CommandProcessor::with_timeout))
/// when that matters.
pub struct Coordinator<P: Processor> {
    workers: WorkerCount,
    poll_interval: Duration,
    processor: Arc<P>,
}

impl<P: Processor> Coordinator<P> {
    pub fn new(workers: WorkerCount, processor: P) -> Self {
        Self {
            workers,
            poll_interval: DEFAULT_POLL_INTERVAL,
            processor: Arc::new(processor),
        }
    }

    /// Validates a raw worker count before anything else is created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `workers` is zero or negative.
    pub fn try_new<N>(workers: N, processor: P) -> Result<Self>
    where
        N: TryInto<WorkerCount, Error = Error>,
    {
        Ok(Self::new(workers.try_into()?, processor))
    }

    /// How long an idle worker waits for an item before re-checking its stop
    /// flag. Defaults to [`DEFAULT_POLL_INTERVAL`].
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub const fn workers(&self) -> WorkerCount {
        self.workers
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Processes every item exactly once and returns when all workers have
    /// joined.
    ///
    /// # Errors
    ///
    /// See [`run_with`](Self::run_with).
    pub fn run<I, T>(&self, items: I) -> Result<RunReport>
    where
        I: IntoIterator<Item = T>,
        T: Into<WorkItem>,
    {
        self.run_with(items, |_| {})
    }

    /// Like [`run`](Self::run), calling `on_result` for each result as it is
    /// received.
    ///
    /// Results arrive in completion order, not submission order.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] or [`Error::WorkerSpawn`] if the pool
    ///   cannot start. No item has been enqueued at that point.
    /// - [`Error::ChannelError`] if every worker disappeared while results
    ///   were still pending.
    /// - [`Error::WorkerPanicked`] if a worker thread panicked outside item
    ///   processing.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(workers = self.workers.get())))]
    pub fn run_with<I, T, F>(&self, items: I, mut on_result: F) -> Result<RunReport>
    where
        I: IntoIterator<Item = T>,
        T: Into<WorkItem>,
        F: FnMut(&WorkResult),
    {
        let start = Instant::now();
        let queue = WorkQueue::new();
        let (results_tx, results_rx) = result_channel();

        let mut pool = WorkerPool::start(
            self.workers,
            self.poll_interval,
            &queue,
            &results_tx,
            Arc::clone(&self.processor),
        )?;
        // Workers own the remaining senders, so `receive` reports an error
        // instead of blocking forever if they all vanish.
        drop(results_tx);

        let mut pending = 0_usize;
        for item in items {
            queue.put(item.into());
            pending += 1;
        }

        #[cfg(feature = "tracing")]
        tracing::info!("Assigned {pending} items to workers");

        let mut results = Vec::with_capacity(pending);
        while pending > 0 {
            let result = match results_rx.receive() {
                Ok(result) => result,
                Err(e) => {
                    let _ = pool.stop();
                    return Err(e);
                }
            };

            #[cfg(feature = "tracing")]
            tracing::info!("{}: {} finished", result.worker, result.item);

            on_result(&result);
            results.push(result);
            pending -= 1;
        }

        pool.stop()?;

        Ok(RunReport {
            results,
            elapsed: start.elapsed(),
        })
    }
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunReport {
    /// One entry per input item, in completion order.
    pub results: Vec<WorkResult>,
    /// Wall-clock time from pool start to the last worker joining.
    pub elapsed: Duration,
}

impl RunReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Results whose external operation could not be invoked.
    pub fn failures(&self) -> impl Iterator<Item = &WorkResult> {
        self.results.iter().filter(|r| r.is_invocation_failure())
    }

    pub fn timed_out(&self) -> impl Iterator<Item = &WorkResult> {
        self.results.iter().filter(|r| r.timed_out())
    }

    /// Processed items sorted by name.
    pub fn items(&self) -> Vec<&WorkItem> {
        let mut items: Vec<_> = self.results.iter().map(|r| &r.item).collect();
        items.sort();
        items
    }
}
