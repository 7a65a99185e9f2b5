use core::time::Duration;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

/// Unbounded multi-consumer FIFO used to hand items to workers.
///
/// Backed by an unbounded [`crossbeam_channel`], which gives linearizable
/// `put`/`try_take`: an item is delivered to exactly one taker and never
/// lost. Cloning the queue clones both channel ends, so every clone observes
/// the same items.
///
/// The queue keeps its own receiver alive, therefore the underlying channel
/// never disconnects while a `WorkQueue` handle exists and [`put`] cannot
/// fail.
///
/// [`put`]: WorkQueue::put
#[derive(Debug)]
pub struct WorkQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// Appends an item. Never blocks.
    pub fn put(&self, item: T) {
        // `self.rx` keeps the channel connected, so send cannot fail.
        let _ = self.tx.send(item);
    }

    /// Removes the oldest item, waiting at most `max_wait` for one to arrive.
    ///
    /// Returns `None` when nothing became available in time. Emptiness is not
    /// an error: workers use the `None` to re-check their stop flag.
    pub fn try_take(&self, max_wait: Duration) -> Option<T> {
        match self.rx.recv_timeout(max_wait) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of items currently waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}
