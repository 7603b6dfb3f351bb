//! Scrape report model and final-status derivation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::progress::ProgressEvent;

/// What caused a scrape run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Manual,
    Cron,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Cron => "cron",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Self::Manual),
            "cron" => Some(Self::Cron),
            _ => None,
        }
    }
}

/// Lifecycle status of a scrape report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    Running,
    Success,
    PartialSuccess,
    Failed,
}

impl ScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::PartialSuccess => "partial_success",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "partial_success" => Some(Self::PartialSuccess),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Derive the final report status from per-cinema outcomes.
///
/// Applied identically by the in-process session manager and the queued
/// worker so both deployments report the same semantics.
pub fn derive_status(successful_cinemas: u32, failed_cinemas: u32) -> ScrapeStatus {
    if failed_cinemas == 0 {
        ScrapeStatus::Success
    } else if successful_cinemas > 0 {
        ScrapeStatus::PartialSuccess
    } else {
        ScrapeStatus::Failed
    }
}

/// One itemized failure recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeErrorEntry {
    pub cinema_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub error: String,
}

impl ScrapeErrorEntry {
    pub fn cinema(cinema_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            cinema_name: cinema_name.into(),
            date: None,
            error: error.into(),
        }
    }

    pub fn date(cinema_name: impl Into<String>, date: NaiveDate, error: impl Into<String>) -> Self {
        Self {
            cinema_name: cinema_name.into(),
            date: Some(date),
            error: error.into(),
        }
    }
}

/// Persisted record of one scrape run.
///
/// Created with status `running` when the run is accepted, finalized exactly
/// once on completion. Never deleted by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeReport {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ScrapeStatus,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub total_cinemas: u32,
    #[serde(default)]
    pub successful_cinemas: u32,
    #[serde(default)]
    pub failed_cinemas: u32,
    #[serde(default)]
    pub total_films: u32,
    #[serde(default)]
    pub total_showtimes: u32,
    #[serde(default)]
    pub errors: Vec<ScrapeErrorEntry>,
    /// Ordered replay of the run's progress events.
    #[serde(default)]
    pub progress_log: Vec<ProgressEvent>,
}

/// Fields written when a report is finalized.
#[derive(Debug, Clone, Default)]
pub struct ReportUpdate {
    pub status: Option<ScrapeStatus>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_cinemas: Option<u32>,
    pub successful_cinemas: Option<u32>,
    pub failed_cinemas: Option<u32>,
    pub total_films: Option<u32>,
    pub total_showtimes: Option<u32>,
    pub errors: Option<Vec<ScrapeErrorEntry>>,
    pub progress_log: Option<Vec<ProgressEvent>>,
}
