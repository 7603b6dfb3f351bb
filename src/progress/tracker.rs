//! Observer-facing progress bus with replayable backlog.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::events::ProgressEvent;

/// Per-observer channel capacity. An observer whose channel fills up is
/// treated as disconnected rather than back-pressuring the emitter.
const OBSERVER_BUFFER: usize = 256;

/// Interval between keep-alive frames while observers are attached.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// What an attached observer receives.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverMessage {
    Event(ProgressEvent),
    /// Keep-alive; never part of the replay backlog.
    Heartbeat,
}

struct Observer {
    id: u64,
    tx: mpsc::Sender<ObserverMessage>,
}

#[derive(Default)]
struct Inner {
    events: Vec<ProgressEvent>,
    observers: Vec<Observer>,
    heartbeat: Option<JoinHandle<()>>,
}

/// An attached observer's view of the bus: the backlog snapshot taken at
/// attach time, then the live channel. Consuming `backlog` before `rx`
/// yields the full emission order with no gaps and no duplicates.
pub struct ObserverHandle {
    pub id: u64,
    pub backlog: Vec<ProgressEvent>,
    pub rx: mpsc::Receiver<ObserverMessage>,
}

/// Fan-out bus for progress events.
///
/// One writer (the scrape algorithm) and any number of observers. `emit` is
/// non-blocking: a slow observer is dropped, never waited on. `attach`
/// replays the backlog so connecting mid-run is equivalent to connecting
/// before the run started.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<Mutex<Inner>>,
    next_id: Arc<AtomicU64>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to the backlog and fan it out to live observers.
    pub fn emit(&self, event: ProgressEvent) {
        let mut inner = self.inner.lock().expect("tracker lock poisoned");
        inner.events.push(event.clone());
        inner
            .observers
            .retain(|obs| obs.tx.try_send(ObserverMessage::Event(event.clone())).is_ok());
        self.sync_heartbeat(&mut inner);
    }

    /// Attach a new observer, atomically snapshotting the backlog.
    pub fn attach(&self) -> ObserverHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(OBSERVER_BUFFER);

        let mut inner = self.inner.lock().expect("tracker lock poisoned");
        let backlog = inner.events.clone();
        inner.observers.push(Observer { id, tx });
        self.sync_heartbeat(&mut inner);

        ObserverHandle { id, backlog, rx }
    }

    /// Remove an observer. Idempotent; unknown ids are ignored.
    pub fn detach(&self, id: u64) {
        let mut inner = self.inner.lock().expect("tracker lock poisoned");
        inner.observers.retain(|obs| obs.id != id);
        self.sync_heartbeat(&mut inner);
    }

    /// Clear the backlog and disconnect every observer.
    ///
    /// Called at the start of a new run so a previous run's history never
    /// leaks into the new one.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("tracker lock poisoned");
        inner.events.clear();
        inner.observers.clear();
        self.sync_heartbeat(&mut inner);
    }

    /// Snapshot of the backlog so far, in emission order.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.inner.lock().expect("tracker lock poisoned").events.clone()
    }

    pub fn observer_count(&self) -> usize {
        self.inner.lock().expect("tracker lock poisoned").observers.len()
    }

    /// Start or stop the heartbeat task to match the observer count.
    fn sync_heartbeat(&self, inner: &mut Inner) {
        if inner.observers.is_empty() {
            if let Some(task) = inner.heartbeat.take() {
                task.abort();
            }
        } else if inner.heartbeat.is_none() {
            let shared = Arc::downgrade(&self.inner);
            inner.heartbeat = Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
                ticker.tick().await; // first tick fires immediately; skip it
                loop {
                    ticker.tick().await;
                    let Some(inner) = shared.upgrade() else { break };
                    let mut inner = inner.lock().expect("tracker lock poisoned");
                    inner
                        .observers
                        .retain(|obs| obs.tx.try_send(ObserverMessage::Heartbeat).is_ok());
                    if inner.observers.is_empty() {
                        inner.heartbeat = None;
                        break;
                    }
                }
            }));
        }
    }
}
