//! The scrape job list.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{decode_job, BrokerError, ScrapeJob, JOBS_QUEUE};

/// Producer/consumer handle on the durable job list.
#[derive(Clone)]
pub struct JobQueue {
    conn: ConnectionManager,
}

impl JobQueue {
    pub async fn connect(redis_url: &str) -> Result<Self, BrokerError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Append a job; returns the resulting queue depth.
    pub async fn enqueue(&self, job: &ScrapeJob) -> Result<usize, BrokerError> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(job)?;
        let depth: usize = conn.rpush(JOBS_QUEUE, payload).await?;
        Ok(depth)
    }

    pub async fn depth(&self) -> Result<usize, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.llen(JOBS_QUEUE).await?)
    }

    /// Blocking pop with a bounded wait so the consumer loop can observe a
    /// shutdown signal between iterations. Timing out is not an error.
    pub async fn dequeue_blocking(
        &self,
        timeout: Duration,
    ) -> Result<Option<ScrapeJob>, BrokerError> {
        let mut conn = self.conn.clone();
        let result: Option<(String, String)> =
            conn.blpop(JOBS_QUEUE, timeout.as_secs_f64()).await?;
        Ok(result.and_then(|(_key, raw)| decode_job(&raw)))
    }

    /// Immediate pop for one-shot invocation.
    pub async fn dequeue_nonblocking(&self) -> Result<Option<ScrapeJob>, BrokerError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.lpop(JOBS_QUEUE, None).await?;
        Ok(raw.as_deref().and_then(decode_job))
    }
}
