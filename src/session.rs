//! Scrape session manager: single-flight and report lifecycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::models::{derive_status, ReportUpdate, ScrapeErrorEntry, ScrapeStatus, TriggerType};
use crate::progress::{FanoutPublisher, ProgressPublisher, ProgressTracker, RecordingPublisher};
use crate::repository::{CatalogStore, StoreError};
use crate::scraper::{run_scraper, ScrapeDefaults, ScrapeOptions};
use crate::source::ShowtimeSource;

/// The single-flight token: exists only while a scrape is actively running
/// in this process.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeSession {
    pub report_id: i64,
    pub trigger_type: TriggerType,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// A run is active; callers should attach to it instead of retrying.
    #[error("a scrape is already in progress")]
    AlreadyRunning {
        started_at: DateTime<Utc>,
        trigger_type: TriggerType,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owns the single-flight invariant and drives runs to completion.
///
/// Two states: Idle (no session held) and Running (one session, one
/// report_id). The session is the sole mutable shared state guarding
/// mutual exclusion; it is only touched here.
pub struct ScrapeManager {
    store: Arc<dyn CatalogStore>,
    source: Arc<dyn ShowtimeSource>,
    tracker: ProgressTracker,
    defaults: ScrapeDefaults,
    /// Extra sink for every emitted event (the cross-process Redis channel).
    relay: Option<Arc<dyn ProgressPublisher>>,
    session: Mutex<Option<ScrapeSession>>,
}

impl ScrapeManager {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        source: Arc<dyn ShowtimeSource>,
        tracker: ProgressTracker,
        defaults: ScrapeDefaults,
    ) -> Self {
        Self {
            store,
            source,
            tracker,
            defaults,
            relay: None,
            session: Mutex::new(None),
        }
    }

    /// Also publish every progress event through `relay`.
    pub fn with_relay(mut self, relay: Arc<dyn ProgressPublisher>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Current session, if a run is active.
    pub async fn current_session(&self) -> Option<ScrapeSession> {
        self.session.lock().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Start a run without blocking the caller.
    ///
    /// Creates the report, claims the session, resets the progress bus, and
    /// launches the algorithm in the background. Returns the report id
    /// immediately. The lock is held across the conflict check and report
    /// creation, so concurrent callers can never create a second report.
    pub async fn start(
        self: &Arc<Self>,
        trigger: TriggerType,
        options: Option<ScrapeOptions>,
    ) -> Result<i64, SessionError> {
        let mut session = self.session.lock().await;
        if let Some(active) = session.as_ref() {
            return Err(SessionError::AlreadyRunning {
                started_at: active.started_at,
                trigger_type: active.trigger_type,
            });
        }

        let report_id = self.store.create_report(trigger).await?;
        *session = Some(ScrapeSession {
            report_id,
            trigger_type: trigger,
            started_at: Utc::now(),
        });
        drop(session);

        info!(report_id, trigger = trigger.as_str(), "starting scrape");
        self.tracker.reset();

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.run_to_completion(report_id, options).await;
        });

        Ok(report_id)
    }

    /// Run a pre-created report to completion, inline.
    ///
    /// The worker path: the report was created by whoever enqueued the job.
    /// Claims the session for the duration so cron firings and queued jobs
    /// share the same single-flight guarantee as API-triggered runs.
    pub async fn execute(
        self: &Arc<Self>,
        report_id: i64,
        trigger: TriggerType,
        options: Option<ScrapeOptions>,
    ) -> Result<(), SessionError> {
        {
            let mut session = self.session.lock().await;
            if let Some(active) = session.as_ref() {
                return Err(SessionError::AlreadyRunning {
                    started_at: active.started_at,
                    trigger_type: active.trigger_type,
                });
            }
            *session = Some(ScrapeSession {
                report_id,
                trigger_type: trigger,
                started_at: Utc::now(),
            });
        }
        self.tracker.reset();
        self.run_to_completion(report_id, options).await;
        Ok(())
    }

    /// Drive the algorithm and finalize the report.
    ///
    /// The Idle transition is unconditional once the algorithm returns or
    /// fails: a persistence error is logged but can never wedge the manager
    /// in Running.
    async fn run_to_completion(self: &Arc<Self>, report_id: i64, options: Option<ScrapeOptions>) {
        let options = options.unwrap_or_default();
        let mut sinks: Vec<Arc<dyn ProgressPublisher>> = vec![Arc::new(self.tracker.clone())];
        if let Some(relay) = &self.relay {
            sinks.push(Arc::clone(relay));
        }
        let recorder = RecordingPublisher::new(Some(Arc::new(FanoutPublisher::new(sinks))));

        let outcome = run_scraper(
            self.store.as_ref(),
            self.source.as_ref(),
            &recorder,
            &options,
            &self.defaults,
        )
        .await;

        let update = match &outcome {
            Ok(summary) => {
                let status = derive_status(summary.successful_cinemas, summary.failed_cinemas);
                info!(
                    report_id,
                    status = status.as_str(),
                    duration_ms = summary.duration_ms,
                    "scrape completed"
                );
                ReportUpdate {
                    status: Some(status),
                    completed_at: Some(Utc::now()),
                    total_cinemas: Some(summary.total_cinemas),
                    successful_cinemas: Some(summary.successful_cinemas),
                    failed_cinemas: Some(summary.failed_cinemas),
                    total_films: Some(summary.total_films),
                    total_showtimes: Some(summary.total_showtimes),
                    errors: Some(summary.errors.clone()),
                    progress_log: Some(recorder.events()),
                }
            }
            Err(err) => {
                error!(report_id, error = %err, "scrape failed");
                ReportUpdate {
                    status: Some(ScrapeStatus::Failed),
                    completed_at: Some(Utc::now()),
                    errors: Some(vec![ScrapeErrorEntry::cinema("System", err.to_string())]),
                    progress_log: Some(recorder.events()),
                    ..Default::default()
                }
            }
        };

        if let Err(err) = self.store.update_report(report_id, update).await {
            error!(report_id, error = %err, "failed to persist final report");
        }

        let mut session = self.session.lock().await;
        if session.as_ref().is_some_and(|s| s.report_id == report_id) {
            *session = None;
        }
    }
}
