//! Storage capability consumed by the scrape pipeline.
//!
//! The pipeline only depends on the [`CatalogStore`] trait; the SQLite
//! implementation is the production backend, the in-memory one backs tests
//! and local experimentation.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    Cinema, CinemaConfig, Film, ReportUpdate, ScrapeReport, Showtime, TriggerType, WeeklyProgram,
};

pub use memory::MemoryCatalogStore;
pub use sqlite::SqliteCatalogStore;

/// Errors surfaced by a catalog store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("no such report: {0}")]
    ReportNotFound(i64),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Persistence surface for cinemas, films, showtimes, and scrape reports.
///
/// All upserts are idempotent on the external source's identifiers:
/// re-running the identical scrape yields the same stored rows.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Create a report with status `running`; returns its id.
    async fn create_report(&self, trigger: TriggerType) -> Result<i64, StoreError>;

    async fn update_report(&self, id: i64, update: ReportUpdate) -> Result<(), StoreError>;

    async fn get_report(&self, id: i64) -> Result<Option<ScrapeReport>, StoreError>;

    /// The most recently started report, if any.
    async fn latest_report(&self) -> Result<Option<ScrapeReport>, StoreError>;

    /// Cinemas configured for scraping, in configured order.
    async fn cinema_configs(&self) -> Result<Vec<CinemaConfig>, StoreError>;

    async fn upsert_cinema_config(&self, config: &CinemaConfig) -> Result<(), StoreError>;

    async fn upsert_cinema(&self, cinema: &Cinema) -> Result<(), StoreError>;

    async fn get_film(&self, id: i64) -> Result<Option<Film>, StoreError>;

    async fn upsert_film(&self, film: &Film) -> Result<(), StoreError>;

    async fn upsert_showtime(&self, showtime: &Showtime) -> Result<(), StoreError>;

    async fn upsert_weekly_programs(&self, programs: &[WeeklyProgram]) -> Result<(), StoreError>;
}
