//! The progress event vocabulary.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::ScrapeErrorEntry;

/// Aggregate counters for one scrape run.
///
/// Built incrementally by the scrape algorithm, finalized once, and embedded
/// in both the `completed` event and the persisted report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapeSummary {
    pub total_cinemas: u32,
    pub successful_cinemas: u32,
    pub failed_cinemas: u32,
    pub total_films: u32,
    pub total_showtimes: u32,
    pub total_dates: u32,
    pub duration_ms: u64,
    pub errors: Vec<ScrapeErrorEntry>,
}

/// A milestone in a scrape run.
///
/// Emission order is the append order of the run's backlog and must be
/// preserved to observers. For any cinema/date/film, the end event is only
/// ever emitted after its matching start event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        total_cinemas: u32,
        total_dates: u32,
    },
    CinemaStarted {
        cinema_name: String,
        cinema_id: String,
        /// 1-based position in the configured cinema order.
        index: u32,
    },
    CinemaCompleted {
        cinema_name: String,
        total_films: u32,
    },
    CinemaFailed {
        cinema_name: String,
        error: String,
    },
    DateStarted {
        cinema_name: String,
        date: NaiveDate,
    },
    DateCompleted {
        date: NaiveDate,
        films_count: u32,
    },
    DateFailed {
        cinema_name: String,
        date: NaiveDate,
        error: String,
    },
    /// The source silently answered with another date's data.
    DateStale {
        cinema_name: String,
        date: NaiveDate,
        actual_date: Option<NaiveDate>,
    },
    FilmStarted {
        film_title: String,
        film_id: i64,
    },
    FilmCompleted {
        film_title: String,
        showtimes_count: u32,
    },
    FilmFailed {
        film_title: String,
        error: String,
    },
    Completed {
        summary: ScrapeSummary,
    },
    Failed {
        error: String,
    },
}

impl ProgressEvent {
    /// Whether this event terminates a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = ProgressEvent::CinemaStarted {
            cinema_name: "Le Grand Rex".into(),
            cinema_id: "C0065".into(),
            index: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "cinema_started");
        assert_eq!(json["cinema_name"], "Le Grand Rex");
        assert_eq!(json["index"], 1);
    }

    #[test]
    fn date_events_use_iso_dates() {
        let event = ProgressEvent::DateStarted {
            cinema_name: "MK2".into(),
            date: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["date"], "2026-02-20");
    }

    #[test]
    fn completed_round_trips() {
        let event = ProgressEvent::Completed {
            summary: ScrapeSummary {
                total_cinemas: 3,
                successful_cinemas: 2,
                failed_cinemas: 1,
                ..Default::default()
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
