use crate::{
    error::{Error, InvocationError, Result},
    item::{WorkItem, WorkerId},
};
use chrono::{DateTime, Utc};
use core::time::Duration;
use crossbeam_channel::{Receiver, Sender};

/// How the external operation for an item returned.
///
/// None of these variants is treated as a failure by the pool. A non-zero
/// exit code is recorded, not interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// The processor returned without an exit status to report.
    Done,
    /// A child process exited. `code` is `None` when it was killed by a
    /// signal.
    Exited { code: Option<i32> },
    /// The operation exceeded its configured timeout and was killed.
    TimedOut,
}

/// The outcome of one item: either it returned, or it could not be invoked.
pub type Outcome = core::result::Result<Completion, InvocationError>;

/// One completed item, sent from a worker to the coordinator.
#[derive(Debug)]
pub struct WorkResult {
    pub worker: WorkerId,
    pub item: WorkItem,
    pub outcome: Outcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl WorkResult {
    /// `true` when the external operation could not be invoked at all.
    pub const fn is_invocation_failure(&self) -> bool {
        self.outcome.is_err()
    }

    pub const fn timed_out(&self) -> bool {
        matches!(self.outcome, Ok(Completion::TimedOut))
    }
}

/// Creates the channel that carries [`WorkResult`]s back to the coordinator.
///
/// The channel is unbounded so a worker never waits on a slow consumer.
pub fn result_channel() -> (ResultSender, ResultReceiver) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (ResultSender { tx }, ResultReceiver { rx })
}

/// Worker side of the result channel. Cheap to clone, one per worker.
#[derive(Clone, Debug)]
pub struct ResultSender {
    tx: Sender<WorkResult>,
}

impl ResultSender {
    /// Hands a result to the coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelError`] if the receiver has been dropped.
    pub fn send(&self, result: WorkResult) -> Result<()> {
        self.tx.send(result).map_err(|e| Error::ChannelError {
            context: format!("result receiver dropped before {} was reported", e.0.item),
        })
    }
}

/// Coordinator side of the result channel.
#[derive(Debug)]
pub struct ResultReceiver {
    rx: Receiver<WorkResult>,
}

impl ResultReceiver {
    /// Blocks until a result arrives.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelError`] once every [`ResultSender`] has been
    /// dropped and no buffered result remains, which means no further result
    /// can ever arrive.
    pub fn receive(&self) -> Result<WorkResult> {
        self.rx.recv().map_err(|_| Error::ChannelError {
            context: "all result senders disconnected".to_string(),
        })
    }

    /// Number of results buffered and not yet received.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
