//! Progress relay over Redis pub/sub.
//!
//! Delivery is at-most-once with no history; a subscriber that attaches
//! late misses earlier publishes. The observer-facing replay guarantee
//! comes from the local [`ProgressTracker`] backlog, not the broker.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{BrokerError, PROGRESS_CHANNEL};
use crate::progress::{ProgressEvent, ProgressPublisher, ProgressTracker};

/// Publishing side of the progress channel (worker process).
#[derive(Clone)]
pub struct RedisProgressPublisher {
    conn: ConnectionManager,
}

impl RedisProgressPublisher {
    pub async fn connect(redis_url: &str) -> Result<Self, BrokerError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl ProgressPublisher for RedisProgressPublisher {
    async fn emit(&self, event: ProgressEvent) {
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to encode progress event");
                return;
            }
        };
        let mut conn = self.conn.clone();
        // Fire-and-forget: a broker hiccup must not abort the scrape.
        if let Err(err) = conn.publish::<_, _, ()>(PROGRESS_CHANNEL, payload).await {
            warn!(error = %err, "failed to publish progress event");
        }
    }
}

/// Subscribing side of the progress channel (API server process).
pub struct ProgressChannel {
    client: redis::Client,
}

impl ProgressChannel {
    pub fn new(redis_url: &str) -> Result<Self, BrokerError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
        })
    }

    /// Subscribe and invoke `handler` for every decoded event. Malformed
    /// payloads are logged and skipped. Runs until the connection drops.
    pub async fn consume<F>(&self, mut handler: F) -> Result<(), BrokerError>
    where
        F: FnMut(ProgressEvent) + Send,
    {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(PROGRESS_CHANNEL).await?;
        debug!(channel = PROGRESS_CHANNEL, "subscribed to progress events");

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(error = %err, "unreadable progress payload");
                    continue;
                }
            };
            match serde_json::from_str::<ProgressEvent>(&payload) {
                Ok(event) => handler(event),
                Err(err) => warn!(error = %err, payload, "discarding malformed progress event"),
            }
        }
        Ok(())
    }
}

/// Bridge broker progress into the local tracker.
///
/// Every event a worker publishes is re-emitted locally, so observers of
/// this process's tracker see the same ordering, replay, and heartbeat
/// behavior whether the scrape runs in-process or in a separate worker.
pub fn spawn_progress_relay(redis_url: String, tracker: ProgressTracker) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let channel = match ProgressChannel::new(&redis_url) {
                Ok(channel) => channel,
                Err(err) => {
                    warn!(error = %err, "progress relay cannot reach broker");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };
            let tracker = tracker.clone();
            let result = channel
                .consume(move |event| {
                    // A new run resets local state before its first event.
                    if matches!(event, ProgressEvent::Started { .. }) {
                        tracker.reset();
                    }
                    tracker.emit(event);
                })
                .await;
            if let Err(err) = result {
                warn!(error = %err, "progress relay disconnected, retrying");
            }
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        }
    })
}
