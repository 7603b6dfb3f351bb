//! The emit side of the progress contract.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::events::ProgressEvent;
use super::tracker::ProgressTracker;

/// Sink for progress events.
///
/// The scrape algorithm is unaware of the deployment: in-process runs hand it
/// the tracker directly, queued workers hand it a Redis-backed publisher that
/// relays over pub/sub. Emission is fire-and-forget; a failing transport logs
/// and never aborts the run.
#[async_trait]
pub trait ProgressPublisher: Send + Sync {
    async fn emit(&self, event: ProgressEvent);
}

#[async_trait]
impl ProgressPublisher for ProgressTracker {
    async fn emit(&self, event: ProgressEvent) {
        ProgressTracker::emit(self, event);
    }
}

/// Forwards every event to several sinks in order.
///
/// Used by workers that feed both the local tracker and the cross-process
/// Redis channel.
pub struct FanoutPublisher {
    sinks: Vec<Arc<dyn ProgressPublisher>>,
}

impl FanoutPublisher {
    pub fn new(sinks: Vec<Arc<dyn ProgressPublisher>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl ProgressPublisher for FanoutPublisher {
    async fn emit(&self, event: ProgressEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone()).await;
        }
    }
}

/// Tees every event into an in-memory log before forwarding.
///
/// Queued workers publish over Redis, which keeps no history; wrapping the
/// transport in a recorder lets the finalized report carry the full
/// progress log in every run mode.
pub struct RecordingPublisher {
    inner: Option<Arc<dyn ProgressPublisher>>,
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingPublisher {
    pub fn new(inner: Option<Arc<dyn ProgressPublisher>>) -> Self {
        Self {
            inner,
            events: Mutex::new(Vec::new()),
        }
    }

    /// The events recorded so far, in emission order.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().expect("recorder lock poisoned").clone()
    }
}

#[async_trait]
impl ProgressPublisher for RecordingPublisher {
    async fn emit(&self, event: ProgressEvent) {
        self.events
            .lock()
            .expect("recorder lock poisoned")
            .push(event.clone());
        if let Some(inner) = &self.inner {
            inner.emit(event).await;
        }
    }
}
