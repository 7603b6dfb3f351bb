//! Catalog models: cinemas, films, showtimes, and weekly programs.
//!
//! These mirror what the external showtime source publishes and what the
//! storage layer persists. All dates are calendar dates (`NaiveDate`),
//! serialized as `YYYY-MM-DD`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A cinema configured for scraping.
///
/// Read-only input to a run; the id is the external source's identifier
/// (e.g. "W7504"), the url points at the cinema's showtime page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CinemaConfig {
    pub id: String,
    pub name: String,
    pub url: String,
}

/// Cinema metadata as published by the external source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cinema {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub screen_count: Option<u32>,
}

/// A film as listed on a showtime page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Film {
    /// External source film id.
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub synopsis: Option<String>,
}

/// Extra film fields fetched from the film detail page.
///
/// Fetched lazily, only when the stored film has no duration yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilmDetails {
    pub duration_minutes: Option<u32>,
}

/// One screening of a film at a cinema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Showtime {
    /// External source showtime id.
    pub id: String,
    pub film_id: i64,
    pub cinema_id: String,
    pub date: NaiveDate,
    /// Local start time, `HH:MM`.
    pub time: String,
    /// Language version: "VF", "VO", "VOST".
    pub version: String,
    /// The Wednesday starting the release week this showtime belongs to.
    pub week_start: NaiveDate,
}

/// A film's presence in a cinema's weekly program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyProgram {
    pub cinema_id: String,
    pub film_id: i64,
    pub week_start: NaiveDate,
    pub is_new_this_week: bool,
    pub scraped_at: DateTime<Utc>,
}

/// A film together with its showtimes on one scraped page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilmShowtimes {
    pub film: Film,
    pub showtimes: Vec<Showtime>,
    #[serde(default)]
    pub is_new_this_week: bool,
}

/// Result of the one-time metadata fetch for a cinema.
#[derive(Debug, Clone)]
pub struct TheaterMeta {
    pub cinema: Cinema,
    /// Dates the source has actually published showtimes for.
    pub published_dates: Vec<NaiveDate>,
}

/// Everything the source returned for one cinema/date request.
///
/// `selected_date` is the date the page *claims* to be showing; the source
/// silently falls back to the nearest published date when the requested one
/// is not available yet, which is what the stale-response guard checks.
#[derive(Debug, Clone)]
pub struct DaySchedule {
    pub selected_date: Option<NaiveDate>,
    pub films: Vec<FilmShowtimes>,
}
