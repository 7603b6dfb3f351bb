//! Worker run modes.
//!
//! Four mutually exclusive modes, selected at process start. All of them
//! funnel into the same report → algorithm → finalization sequence owned by
//! the session manager; only the triggering mechanism differs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::broker::{JobQueue, ScrapeJob};
use crate::models::{ReportUpdate, ScrapeStatus, TriggerType};
use crate::repository::CatalogStore;
use crate::scraper::ScrapeOptions;
use crate::session::{ScrapeManager, SessionError};

/// Bounded wait per consumer-loop iteration, so a shutdown signal is
/// observed promptly between blocking dequeues.
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// How this worker process behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RunMode {
    /// Pop one job if present, execute it, exit. For external schedulers.
    Oneshot,
    /// Long-running queue consumer; one job at a time until signaled.
    Consumer,
    /// Run on a schedule, no queue involvement.
    Cron,
    /// Run once immediately, then exit.
    Direct,
}

pub struct Worker {
    manager: Arc<ScrapeManager>,
    store: Arc<dyn CatalogStore>,
    queue: Option<JobQueue>,
    cron_schedule: String,
    /// Film filter for direct runs.
    film_id: Option<i64>,
}

impl Worker {
    pub fn new(
        manager: Arc<ScrapeManager>,
        store: Arc<dyn CatalogStore>,
        queue: Option<JobQueue>,
        cron_schedule: String,
        film_id: Option<i64>,
    ) -> Self {
        Self {
            manager,
            store,
            queue,
            cron_schedule,
            film_id,
        }
    }

    pub async fn run(&self, mode: RunMode) -> anyhow::Result<()> {
        info!(?mode, "worker starting");
        match mode {
            RunMode::Oneshot => self.run_oneshot().await,
            RunMode::Consumer => self.run_consumer().await,
            RunMode::Cron => self.run_cron().await,
            RunMode::Direct => self.run_direct().await,
        }
    }

    fn queue(&self) -> anyhow::Result<&JobQueue> {
        self.queue
            .as_ref()
            .context("queue modes need a configured redis_url")
    }

    async fn run_oneshot(&self) -> anyhow::Result<()> {
        let queue = self.queue()?;
        match queue.dequeue_nonblocking().await? {
            Some(job) => {
                info!(report_id = job.report_id, "processing job");
                self.execute_job(job).await;
            }
            None => info!("no job in queue, exiting"),
        }
        Ok(())
    }

    async fn run_consumer(&self) -> anyhow::Result<()> {
        let queue = self.queue()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(true);
            }
        });

        info!(timeout_secs = DEQUEUE_TIMEOUT.as_secs(), "waiting for scrape jobs");
        // The shutdown flag is only checked between iterations: an in-flight
        // scrape always runs to completion.
        while !*shutdown_rx.borrow() {
            match queue.dequeue_blocking(DEQUEUE_TIMEOUT).await {
                Ok(Some(job)) => {
                    info!(
                        report_id = job.report_id,
                        trigger = job.trigger_type.as_str(),
                        "received job"
                    );
                    self.execute_job(job).await;
                }
                Ok(None) => {} // timeout or malformed payload, loop again
                Err(err) => {
                    error!(error = %err, "error polling queue");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        info!("consumer stopped");
        Ok(())
    }

    async fn run_cron(&self) -> anyhow::Result<()> {
        let mut scheduler = JobScheduler::new().await?;
        info!(schedule = %self.cron_schedule, "scheduling cron scrapes");

        let manager = Arc::clone(&self.manager);
        let store = Arc::clone(&self.store);
        let job = Job::new_async(self.cron_schedule.as_str(), move |_uuid, _lock| {
            let manager = Arc::clone(&manager);
            let store = Arc::clone(&store);
            Box::pin(async move {
                if manager.is_running().await {
                    warn!("scrape already running, skipping cron trigger");
                    return;
                }
                let report_id = match store.create_report(TriggerType::Cron).await {
                    Ok(id) => id,
                    Err(err) => {
                        error!(error = %err, "failed to create scrape report");
                        return;
                    }
                };
                if let Err(err) = manager.execute(report_id, TriggerType::Cron, None).await {
                    error!(report_id, error = %err, "cron scrape did not start");
                }
            })
        })
        .context("invalid cron schedule")?;

        scheduler.add(job).await?;
        scheduler.start().await?;
        info!("cron task scheduled, waiting");

        tokio::signal::ctrl_c().await?;
        info!("shutting down cron worker");
        scheduler.shutdown().await?;
        Ok(())
    }

    async fn run_direct(&self) -> anyhow::Result<()> {
        let report_id = self.store.create_report(TriggerType::Manual).await?;
        let options = self.film_id.map(|film_id| ScrapeOptions {
            film_id: Some(film_id),
            ..Default::default()
        });

        match self.manager.execute(report_id, TriggerType::Manual, options).await {
            Ok(()) => {
                if let Some(report) = self.store.get_report(report_id).await? {
                    info!(report_id, status = report.status.as_str(), "direct run completed");
                }
                Ok(())
            }
            Err(SessionError::AlreadyRunning { .. }) => {
                anyhow::bail!("a scrape is already in progress")
            }
            Err(SessionError::Store(err)) => Err(err.into()),
        }
    }

    /// Shared job execution: mark the report running, drive the algorithm,
    /// let the manager finalize. Errors never escape the consumer loop.
    async fn execute_job(&self, job: ScrapeJob) {
        // The report was created by the enqueuing side; refresh its status
        // in case it sat in the queue across a restart.
        if let Err(err) = self
            .store
            .update_report(
                job.report_id,
                ReportUpdate {
                    status: Some(ScrapeStatus::Running),
                    ..Default::default()
                },
            )
            .await
        {
            warn!(report_id = job.report_id, error = %err, "could not update report");
        }

        if let Err(err) = self
            .manager
            .execute(job.report_id, job.trigger_type, job.options)
            .await
        {
            // Structurally unreachable: the consumer processes one job at a
            // time. Logged rather than trusted.
            error!(report_id = job.report_id, error = %err, "job rejected");
        }
    }
}
