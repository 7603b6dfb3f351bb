//! Data models shared across the scraper, storage, and API layers.

pub mod catalog;
pub mod report;

pub use catalog::{
    Cinema, CinemaConfig, DaySchedule, Film, FilmDetails, FilmShowtimes, Showtime, TheaterMeta,
    WeeklyProgram,
};
pub use report::{
    derive_status, ReportUpdate, ScrapeErrorEntry, ScrapeReport, ScrapeStatus, TriggerType,
};
