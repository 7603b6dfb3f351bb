//! Redis broker adapter: durable job queue plus progress pub/sub.
//!
//! Crosses the process boundary between the request-accepting API server
//! and the worker. The queue is a Redis list (durable until popped); the
//! progress channel is fire-and-forget pub/sub, which is why the progress
//! tracker keeps its own replay backlog instead of relying on the broker.

mod pubsub;
mod queue;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::TriggerType;
use crate::scraper::ScrapeOptions;

pub use pubsub::{spawn_progress_relay, ProgressChannel, RedisProgressPublisher};
pub use queue::JobQueue;

/// Redis key of the scrape job list.
pub const JOBS_QUEUE: &str = "scrape:jobs";
/// Redis pub/sub channel carrying progress events.
pub const PROGRESS_CHANNEL: &str = "scrape:progress";

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("failed to encode job: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A scrape request crossing the broker boundary.
///
/// Immutable once enqueued; consumed exactly once by whichever worker pops
/// it. The report referenced by `report_id` was created (status `running`)
/// by the enqueuing side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub report_id: i64,
    pub trigger_type: TriggerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ScrapeOptions>,
}

/// Decode a queue entry, logging and discarding malformed payloads.
///
/// A bad entry must never crash the consumer loop.
fn decode_job(raw: &str) -> Option<ScrapeJob> {
    match serde_json::from_str(raw) {
        Ok(job) => Some(job),
        Err(err) => {
            tracing::warn!(error = %err, raw, "discarding malformed job payload");
            None
        }
    }
}
