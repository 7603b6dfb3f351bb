//! Fetch capability consumed by the scrape pipeline.
//!
//! The pipeline depends only on the [`ShowtimeSource`] trait; the HTTP
//! implementation talks to the external showtime publisher's JSON endpoints.

pub mod http;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{CinemaConfig, DaySchedule, FilmDetails, TheaterMeta};

pub use http::HttpShowtimeSource;

/// Errors surfaced by a showtime source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

/// External publisher of cinema metadata and showtimes.
#[async_trait]
pub trait ShowtimeSource: Send + Sync {
    /// Fetch a cinema's metadata and the dates it has actually published.
    async fn fetch_theater_meta(&self, config: &CinemaConfig) -> Result<TheaterMeta, SourceError>;

    /// Fetch the schedule for one cinema and date.
    async fn fetch_day(&self, cinema_id: &str, date: NaiveDate) -> Result<DaySchedule, SourceError>;

    /// Fetch extra film fields from the film detail page.
    async fn fetch_film_details(&self, film_id: i64) -> Result<FilmDetails, SourceError>;
}
