use crate::{
    channel::{ResultSender, WorkResult},
    error::InvocationError,
    item::{WorkItem, WorkerId},
    processor::Processor,
    queue::WorkQueue,
};
use chrono::Utc;
use core::{any::Any, time::Duration};
use portable_atomic::{AtomicBool, AtomicU8, Ordering};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Instant,
};

/// Lifecycle of a single worker thread.
///
/// `Idle -> Processing -> Idle -> ... -> Stopped`. A worker leaves `Idle`
/// for `Stopped` only between items, never while processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Idle = 0,
    Processing = 1,
    Stopped = 2,
}

impl WorkerState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Processing,
            _ => Self::Stopped,
        }
    }
}

/// Flags shared between a worker thread and the pool that owns it.
///
/// Only the pool writes `stop`. The worker owns `state` until it is joined.
#[derive(Debug)]
pub(crate) struct WorkerSignals {
    stop: AtomicBool,
    state: AtomicU8,
}

impl WorkerSignals {
    pub(crate) const fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            state: AtomicU8::new(WorkerState::Idle as u8),
        }
    }

    /// Idempotent.
    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub(crate) fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Everything a worker thread needs, moved into the thread at spawn.
pub(crate) struct WorkerContext<P: Processor> {
    pub id: WorkerId,
    pub queue: WorkQueue<WorkItem>,
    pub results: ResultSender,
    pub processor: Arc<P>,
    pub poll_interval: Duration,
    pub signals: Arc<WorkerSignals>,
}

/// Body of a worker thread.
///
/// Each turn the worker first honors a pending stop request, then waits up
/// to `poll_interval` for an item. An item is processed to completion and
/// reported before the loop turns again, so a stop request never interrupts
/// an in-flight item. Exactly one [`WorkResult`] is sent per item taken,
/// including items whose processor failed to launch or panicked.
pub(crate) fn worker_loop<P: Processor>(ctx: WorkerContext<P>) {
    let WorkerContext {
        id,
        queue,
        results,
        processor,
        poll_interval,
        signals,
    } = ctx;

    #[cfg(feature = "tracing")]
    tracing::trace!("{id} started");

    while !signals.stop_requested() {
        let Some(item) = queue.try_take(poll_interval) else {
            continue;
        };

        signals.set_state(WorkerState::Processing);
        let result = process_item(id, &*processor, item);
        signals.set_state(WorkerState::Idle);

        if let Err(_e) = results.send(result) {
            #[cfg(feature = "tracing")]
            tracing::error!("{id} could not report result: {_e}");
        }
    }

    signals.set_state(WorkerState::Stopped);

    #[cfg(feature = "tracing")]
    tracing::trace!("{id} stopped");
}

fn process_item<P: Processor>(id: WorkerId, processor: &P, item: WorkItem) -> WorkResult {
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("item", worker = %id, item = %item).entered();

    #[cfg(feature = "tracing")]
    tracing::info!("{id}: {item} started");

    let started_at = Utc::now();
    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| processor.process(&item)))
        .unwrap_or_else(|payload| {
            Err(InvocationError::Panicked {
                message: panic_message(&*payload),
            })
        });
    let elapsed = start.elapsed();

    #[cfg(feature = "tracing")]
    {
        match &outcome {
            Ok(completion) => tracing::debug!("{id}: {item} returned {completion:?} in {elapsed:?}"),
            Err(e) => tracing::warn!("{id}: {item} could not be processed: {e}"),
        }
    }

    WorkResult {
        worker: id,
        item,
        outcome,
        started_at,
        finished_at: Utc::now(),
        elapsed,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Completion, Outcome, result_channel};
    use std::thread;

    fn spawn_worker<P: Processor>(
        processor: P,
        queue: &WorkQueue<WorkItem>,
        results: ResultSender,
    ) -> (Arc<WorkerSignals>, thread::JoinHandle<()>) {
        let signals = Arc::new(WorkerSignals::new());
        let ctx = WorkerContext {
            id: WorkerId(1),
            queue: queue.clone(),
            results,
            processor: Arc::new(processor),
            poll_interval: Duration::from_millis(10),
            signals: Arc::clone(&signals),
        };
        (signals, thread::spawn(move || worker_loop(ctx)))
    }

    #[test]
    fn idle_worker_stops_on_request() {
        let queue = WorkQueue::new();
        let (tx, _rx) = result_channel();
        let (signals, handle) = spawn_worker(|_: &WorkItem| -> Outcome { Ok(Completion::Done) }, &queue, tx);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(signals.state(), WorkerState::Idle);

        signals.request_stop();
        handle.join().unwrap();
        assert_eq!(signals.state(), WorkerState::Stopped);
    }

    #[test]
    fn in_flight_item_finishes_before_stop() {
        let queue = WorkQueue::new();
        let (tx, rx) = result_channel();
        let (signals, handle) = spawn_worker(
            |_: &WorkItem| -> Outcome {
                thread::sleep(Duration::from_millis(150));
                Ok(Completion::Done)
            },
            &queue,
            tx,
        );

        queue.put(WorkItem::from("movies"));
        while signals.state() != WorkerState::Processing {
            thread::sleep(Duration::from_millis(1));
        }
        signals.request_stop();
        handle.join().unwrap();

        let result = rx.receive().unwrap();
        assert_eq!(result.item.as_str(), "movies");
        assert!(matches!(result.outcome, Ok(Completion::Done)));
        assert!(result.elapsed >= Duration::from_millis(150));
        assert!(result.finished_at >= result.started_at);
    }

    #[test]
    fn panicking_processor_still_reports_a_result() {
        let queue = WorkQueue::new();
        let (tx, rx) = result_channel();
        let (signals, handle) = spawn_worker(
            |item: &WorkItem| -> Outcome { panic!("cannot handle {item}") },
            &queue,
            tx,
        );

        queue.put(WorkItem::from("anime"));
        let result = rx.receive().unwrap();
        match result.outcome {
            Err(InvocationError::Panicked { message }) => {
                assert_eq!(message, "cannot handle anime");
            }
            other => panic!("expected panic capture, got {other:?}"),
        }

        // The worker survives and keeps draining the queue.
        queue.put(WorkItem::from("tv"));
        assert_eq!(rx.receive().unwrap().item.as_str(), "tv");

        signals.request_stop();
        handle.join().unwrap();
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn item_start_is_logged_at_info() {
        use core::fmt;
        use std::sync::Mutex;
        use tracing::{Event, Level, Subscriber, field};
        use tracing_subscriber::{Layer, Registry, layer::Context, layer::SubscriberExt};

        type Events = Arc<Mutex<Vec<(Level, String)>>>;

        struct Capture(Events);

        struct Message(String);

        impl field::Visit for Message {
            fn record_debug(&mut self, field: &field::Field, value: &dyn fmt::Debug) {
                if field.name() == "message" {
                    self.0 = format!("{value:?}");
                }
            }
        }

        impl<S: Subscriber> Layer<S> for Capture {
            fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
                let mut message = Message(String::new());
                event.record(&mut message);
                self.0
                    .lock()
                    .unwrap()
                    .push((*event.metadata().level(), message.0));
            }
        }

        let events: Events = Arc::default();
        let subscriber = Registry::default().with(Capture(Arc::clone(&events)));
        let done = |_: &WorkItem| -> Outcome { Ok(Completion::Done) };
        let result = tracing::subscriber::with_default(subscriber, || {
            process_item(WorkerId(3), &done, WorkItem::from("games"))
        });

        assert!(matches!(result.outcome, Ok(Completion::Done)));
        let events = events.lock().unwrap();
        assert!(
            events.contains(&(Level::INFO, "worker-3: games started".to_string())),
            "events: {events:?}"
        );
    }

    #[test]
    fn panic_message_handles_payload_kinds() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u32), "non-string panic payload");
    }
}
