//! The per-run crawl loop.
//!
//! Strictly sequential across cinemas and dates: deterministic progress
//! ordering, and the external source is not hammered. Every per-unit
//! failure (film, date, cinema) is caught at its own boundary and the run
//! degrades instead of aborting; only a failure before the loop starts is
//! fatal.

mod dates;
mod stale;

use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::models::{CinemaConfig, ScrapeErrorEntry, WeeklyProgram};
use crate::progress::{ProgressEvent, ProgressPublisher, ScrapeSummary};
use crate::repository::{CatalogStore, StoreError};
use crate::source::ShowtimeSource;

pub use dates::{scrape_dates, week_start_for, ScrapeMode};
pub use stale::is_stale_response;

/// Per-job overrides for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ScrapeMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
    /// Restrict the crawl to a single film.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub film_id: Option<i64>,
}

/// Run defaults taken from settings when a job carries no overrides.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeDefaults {
    pub mode: ScrapeMode,
    pub days: Option<u32>,
    /// Cooperative pacing delay between requests. Not a retry backoff.
    pub pacing: Duration,
}

impl Default for ScrapeDefaults {
    fn default() -> Self {
        Self {
            mode: ScrapeMode::default(),
            days: Some(7),
            pacing: Duration::from_millis(500),
        }
    }
}

/// The only fatal path out of a run: nothing was crawled yet.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to load cinema configuration: {0}")]
    Configuration(#[from] StoreError),
}

enum DateOutcome {
    Scraped { films: u32, showtimes: u32 },
    Stale { actual: Option<NaiveDate> },
}

/// Run a full scrape and return its summary.
///
/// Emits progress events for every milestone; the caller owns report
/// persistence and final-status derivation.
pub async fn run_scraper(
    store: &dyn CatalogStore,
    source: &dyn ShowtimeSource,
    progress: &dyn ProgressPublisher,
    options: &ScrapeOptions,
    defaults: &ScrapeDefaults,
) -> Result<ScrapeSummary, ScrapeError> {
    let started = Instant::now();
    let mut summary = ScrapeSummary::default();

    let cinemas = match store.cinema_configs().await {
        Ok(cinemas) => cinemas,
        Err(err) => {
            error!(error = %err, "cannot load cinema list");
            progress
                .emit(ProgressEvent::Failed {
                    error: err.to_string(),
                })
                .await;
            return Err(err.into());
        }
    };

    let mode = options.mode.unwrap_or(defaults.mode);
    let days = options.days.or(defaults.days);
    let dates = scrape_dates(mode, days, chrono::Local::now().date_naive());
    info!(
        cinemas = cinemas.len(),
        dates = dates.len(),
        ?mode,
        "starting scrape"
    );

    summary.total_cinemas = cinemas.len() as u32;
    summary.total_dates = dates.len() as u32;

    progress
        .emit(ProgressEvent::Started {
            total_cinemas: summary.total_cinemas,
            total_dates: summary.total_dates,
        })
        .await;

    for (index, cinema) in cinemas.iter().enumerate() {
        progress
            .emit(ProgressEvent::CinemaStarted {
                cinema_name: cinema.name.clone(),
                cinema_id: cinema.id.clone(),
                index: index as u32 + 1,
            })
            .await;

        scrape_cinema(store, source, progress, cinema, &dates, options, defaults, &mut summary)
            .await;

        tokio::time::sleep(defaults.pacing).await;
    }

    summary.duration_ms = started.elapsed().as_millis() as u64;
    info!(
        successful = summary.successful_cinemas,
        failed = summary.failed_cinemas,
        films = summary.total_films,
        showtimes = summary.total_showtimes,
        "scrape finished"
    );

    progress
        .emit(ProgressEvent::Completed {
            summary: summary.clone(),
        })
        .await;

    Ok(summary)
}

/// Crawl one cinema across the wanted dates, folding its outcome into the
/// summary. A cinema that yields zero successful dates out of at least one
/// attempted is failed outright and contributes no partial counts.
#[allow(clippy::too_many_arguments)]
async fn scrape_cinema(
    store: &dyn CatalogStore,
    source: &dyn ShowtimeSource,
    progress: &dyn ProgressPublisher,
    cinema: &CinemaConfig,
    wanted_dates: &[NaiveDate],
    options: &ScrapeOptions,
    defaults: &ScrapeDefaults,
    summary: &mut ScrapeSummary,
) {
    let meta = match source.fetch_theater_meta(cinema).await {
        Ok(meta) => meta,
        Err(err) => {
            error!(cinema = %cinema.name, error = %err, "metadata fetch failed");
            summary
                .errors
                .push(ScrapeErrorEntry::cinema(&cinema.name, err.to_string()));
            summary.failed_cinemas += 1;
            progress
                .emit(ProgressEvent::CinemaFailed {
                    cinema_name: cinema.name.clone(),
                    error: err.to_string(),
                })
                .await;
            return;
        }
    };

    if let Err(err) = store.upsert_cinema(&meta.cinema).await {
        error!(cinema = %cinema.name, error = %err, "cinema upsert failed");
        summary
            .errors
            .push(ScrapeErrorEntry::cinema(&cinema.name, err.to_string()));
        summary.failed_cinemas += 1;
        progress
            .emit(ProgressEvent::CinemaFailed {
                cinema_name: cinema.name.clone(),
                error: err.to_string(),
            })
            .await;
        return;
    }

    // Only crawl dates the source has actually published; a wanted date the
    // publisher has not released yet is skipped, not failed.
    let targets: Vec<NaiveDate> = wanted_dates
        .iter()
        .copied()
        .filter(|d| meta.published_dates.contains(d))
        .collect();
    if targets.len() < wanted_dates.len() {
        debug!(
            cinema = %cinema.name,
            skipped = wanted_dates.len() - targets.len(),
            "dates not yet published"
        );
    }

    let mut cinema_films = 0u32;
    let mut cinema_showtimes = 0u32;
    let mut successful_dates = 0u32;

    for date in &targets {
        match scrape_day(store, source, progress, cinema, *date, options, defaults).await {
            Ok(DateOutcome::Scraped { films, showtimes }) => {
                cinema_films += films;
                cinema_showtimes += showtimes;
                successful_dates += 1;
            }
            Ok(DateOutcome::Stale { actual }) => {
                let shown = actual.map_or_else(|| "an unknown date".to_string(), |d| d.to_string());
                warn!(cinema = %cinema.name, %date, %shown, "stale response, skipping date");
                summary.errors.push(ScrapeErrorEntry::date(
                    &cinema.name,
                    *date,
                    format!("stale response: source returned data for {shown}"),
                ));
            }
            Err(message) => {
                error!(cinema = %cinema.name, %date, error = %message, "date scrape failed");
                summary
                    .errors
                    .push(ScrapeErrorEntry::date(&cinema.name, *date, message.clone()));
                progress
                    .emit(ProgressEvent::DateFailed {
                        cinema_name: cinema.name.clone(),
                        date: *date,
                        error: message,
                    })
                    .await;
            }
        }
        tokio::time::sleep(defaults.pacing).await;
    }

    let failed_completely = successful_dates == 0 && !targets.is_empty();
    if failed_completely {
        // Partial counts from dates that half-succeeded are discarded so a
        // fully failed cinema cannot masquerade as a partial success.
        summary.failed_cinemas += 1;
        summary.errors.push(ScrapeErrorEntry::cinema(
            &cinema.name,
            format!("all {} scraped dates failed", targets.len()),
        ));
        progress
            .emit(ProgressEvent::CinemaFailed {
                cinema_name: cinema.name.clone(),
                error: format!("all {} scraped dates failed", targets.len()),
            })
            .await;
    } else {
        summary.successful_cinemas += 1;
        summary.total_films += cinema_films;
        summary.total_showtimes += cinema_showtimes;
        progress
            .emit(ProgressEvent::CinemaCompleted {
                cinema_name: cinema.name.clone(),
                total_films: cinema_films,
            })
            .await;
    }
}

/// Crawl one cinema/date. Film-level failures are absorbed here; a fetch or
/// batch-upsert failure fails the whole date and is reported by the caller.
async fn scrape_day(
    store: &dyn CatalogStore,
    source: &dyn ShowtimeSource,
    progress: &dyn ProgressPublisher,
    cinema: &CinemaConfig,
    date: NaiveDate,
    options: &ScrapeOptions,
    defaults: &ScrapeDefaults,
) -> Result<DateOutcome, String> {
    progress
        .emit(ProgressEvent::DateStarted {
            cinema_name: cinema.name.clone(),
            date,
        })
        .await;

    let day = source
        .fetch_day(&cinema.id, date)
        .await
        .map_err(|e| e.to_string())?;

    let all_showtimes: Vec<_> = day
        .films
        .iter()
        .flat_map(|f| f.showtimes.iter().cloned())
        .collect();
    if is_stale_response(date, day.selected_date, &all_showtimes) {
        let actual = day
            .selected_date
            .or_else(|| all_showtimes.first().map(|s| s.date));
        progress
            .emit(ProgressEvent::DateStale {
                cinema_name: cinema.name.clone(),
                date,
                actual_date: actual,
            })
            .await;
        return Ok(DateOutcome::Stale { actual });
    }

    let films: Vec<_> = day
        .films
        .into_iter()
        .filter(|f| options.film_id.map_or(true, |id| f.film.id == id))
        .collect();
    debug!(cinema = %cinema.name, %date, films = films.len(), "films found");

    let mut films_count = 0u32;
    let mut showtimes_count = 0u32;
    let mut weekly_programs: Vec<WeeklyProgram> = Vec::new();

    for film_data in films {
        let mut film = film_data.film.clone();
        progress
            .emit(ProgressEvent::FilmStarted {
                film_title: film.title.clone(),
                film_id: film.id,
            })
            .await;

        let result: Result<(), String> = async {
            let existing = store.get_film(film.id).await.map_err(|e| e.to_string())?;
            let known_duration = existing.as_ref().and_then(|f| f.duration_minutes);

            if known_duration.is_none() {
                // Best effort: a missing detail page only costs the duration.
                match source.fetch_film_details(film.id).await {
                    Ok(details) => {
                        if details.duration_minutes.is_some() {
                            film.duration_minutes = details.duration_minutes;
                        }
                    }
                    Err(err) => {
                        warn!(film = %film.title, error = %err, "film detail fetch failed")
                    }
                }
                tokio::time::sleep(defaults.pacing).await;
            } else {
                film.duration_minutes = known_duration;
            }

            store.upsert_film(&film).await.map_err(|e| e.to_string())?;
            for showtime in &film_data.showtimes {
                store
                    .upsert_showtime(showtime)
                    .await
                    .map_err(|e| e.to_string())?;
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                weekly_programs.push(WeeklyProgram {
                    cinema_id: cinema.id.clone(),
                    film_id: film.id,
                    week_start: film_data
                        .showtimes
                        .first()
                        .map(|s| s.week_start)
                        .unwrap_or_else(|| week_start_for(date)),
                    is_new_this_week: film_data.is_new_this_week,
                    scraped_at: Utc::now(),
                });
                films_count += 1;
                showtimes_count += film_data.showtimes.len() as u32;
                progress
                    .emit(ProgressEvent::FilmCompleted {
                        film_title: film.title.clone(),
                        showtimes_count: film_data.showtimes.len() as u32,
                    })
                    .await;
            }
            Err(message) => {
                error!(film = %film.title, error = %message, "film processing failed");
                progress
                    .emit(ProgressEvent::FilmFailed {
                        film_title: film.title.clone(),
                        error: message,
                    })
                    .await;
            }
        }
    }

    if !weekly_programs.is_empty() {
        store
            .upsert_weekly_programs(&weekly_programs)
            .await
            .map_err(|e| e.to_string())?;
    }

    progress
        .emit(ProgressEvent::DateCompleted { date, films_count })
        .await;

    Ok(DateOutcome::Scraped {
        films: films_count,
        showtimes: showtimes_count,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use async_trait::async_trait;
    use chrono::Datelike;

    use super::*;
    use crate::models::{
        Cinema, DaySchedule, Film, FilmDetails, FilmShowtimes, ReportUpdate, ScrapeReport,
        Showtime, TheaterMeta, TriggerType,
    };
    use crate::progress::RecordingPublisher;
    use crate::repository::MemoryCatalogStore;
    use crate::source::SourceError;

    fn today() -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    fn configs(n: usize) -> Vec<CinemaConfig> {
        (1..=n)
            .map(|i| CinemaConfig {
                id: format!("C{i}"),
                name: format!("Cinema {i}"),
                url: format!("https://example.org/C{i}"),
            })
            .collect()
    }

    fn test_defaults() -> ScrapeDefaults {
        ScrapeDefaults {
            mode: ScrapeMode::FromToday,
            days: Some(3),
            pacing: Duration::ZERO,
        }
    }

    /// Scripted showtime source: every published day carries `films_per_day`
    /// films with two showtimes each, unless a failure or stale response is
    /// scripted for that cinema/date.
    #[derive(Default)]
    struct FakeSource {
        published: Vec<NaiveDate>,
        films_per_day: usize,
        fail_meta: HashSet<String>,
        fail_days: HashSet<(String, NaiveDate)>,
        stale_days: HashMap<(String, NaiveDate), NaiveDate>,
    }

    impl FakeSource {
        fn new(films_per_day: usize, published_days: u32) -> Self {
            Self {
                published: (0..published_days)
                    .map(|i| today() + chrono::Duration::days(i64::from(i)))
                    .collect(),
                films_per_day,
                ..Default::default()
            }
        }

        fn film_id(date: NaiveDate, index: usize) -> i64 {
            i64::from(date.ordinal()) * 100 + index as i64
        }
    }

    #[async_trait]
    impl ShowtimeSource for FakeSource {
        async fn fetch_theater_meta(
            &self,
            config: &CinemaConfig,
        ) -> Result<TheaterMeta, SourceError> {
            if self.fail_meta.contains(&config.id) {
                return Err(SourceError::Status {
                    status: 503,
                    url: config.url.clone(),
                });
            }
            Ok(TheaterMeta {
                cinema: Cinema {
                    id: config.id.clone(),
                    name: config.name.clone(),
                    ..Default::default()
                },
                published_dates: self.published.clone(),
            })
        }

        async fn fetch_day(
            &self,
            cinema_id: &str,
            date: NaiveDate,
        ) -> Result<DaySchedule, SourceError> {
            let key = (cinema_id.to_string(), date);
            if self.fail_days.contains(&key) {
                return Err(SourceError::Request("connection reset".into()));
            }
            let served = self.stale_days.get(&key).copied().unwrap_or(date);
            let films = (0..self.films_per_day)
                .map(|i| {
                    let film_id = Self::film_id(served, i);
                    let film = Film {
                        id: film_id,
                        title: format!("Film {film_id}"),
                        original_title: None,
                        duration_minutes: None,
                        genres: Vec::new(),
                        director: None,
                        synopsis: None,
                    };
                    let showtimes = (0..2)
                        .map(|n| Showtime {
                            id: format!("{cinema_id}-{served}-{i}-{n}"),
                            film_id,
                            cinema_id: cinema_id.to_string(),
                            date: served,
                            time: format!("1{n}:00"),
                            version: "VF".into(),
                            week_start: week_start_for(served),
                        })
                        .collect();
                    FilmShowtimes {
                        film,
                        showtimes,
                        is_new_this_week: false,
                    }
                })
                .collect();
            Ok(DaySchedule {
                selected_date: Some(served),
                films,
            })
        }

        async fn fetch_film_details(&self, _film_id: i64) -> Result<FilmDetails, SourceError> {
            Ok(FilmDetails {
                duration_minutes: Some(105),
            })
        }
    }

    /// Store wrapper that injects failures at scripted points.
    struct ScriptedStore {
        inner: MemoryCatalogStore,
        fail_configs: bool,
        fail_film_upserts: HashSet<i64>,
        fail_weekly: bool,
    }

    impl ScriptedStore {
        fn new(configs: Vec<CinemaConfig>) -> Self {
            Self {
                inner: MemoryCatalogStore::with_cinemas(configs),
                fail_configs: false,
                fail_film_upserts: HashSet::new(),
                fail_weekly: false,
            }
        }
    }

    #[async_trait]
    impl CatalogStore for ScriptedStore {
        async fn create_report(&self, trigger: TriggerType) -> Result<i64, StoreError> {
            self.inner.create_report(trigger).await
        }
        async fn update_report(&self, id: i64, update: ReportUpdate) -> Result<(), StoreError> {
            self.inner.update_report(id, update).await
        }
        async fn get_report(&self, id: i64) -> Result<Option<ScrapeReport>, StoreError> {
            self.inner.get_report(id).await
        }
        async fn latest_report(&self) -> Result<Option<ScrapeReport>, StoreError> {
            self.inner.latest_report().await
        }
        async fn cinema_configs(&self) -> Result<Vec<CinemaConfig>, StoreError> {
            if self.fail_configs {
                return Err(StoreError::Database("disk I/O error".into()));
            }
            self.inner.cinema_configs().await
        }
        async fn upsert_cinema_config(&self, config: &CinemaConfig) -> Result<(), StoreError> {
            self.inner.upsert_cinema_config(config).await
        }
        async fn upsert_cinema(&self, cinema: &Cinema) -> Result<(), StoreError> {
            self.inner.upsert_cinema(cinema).await
        }
        async fn get_film(&self, id: i64) -> Result<Option<Film>, StoreError> {
            self.inner.get_film(id).await
        }
        async fn upsert_film(&self, film: &Film) -> Result<(), StoreError> {
            if self.fail_film_upserts.contains(&film.id) {
                return Err(StoreError::Database("constraint violation".into()));
            }
            self.inner.upsert_film(film).await
        }
        async fn upsert_showtime(&self, showtime: &Showtime) -> Result<(), StoreError> {
            self.inner.upsert_showtime(showtime).await
        }
        async fn upsert_weekly_programs(
            &self,
            programs: &[WeeklyProgram],
        ) -> Result<(), StoreError> {
            if self.fail_weekly {
                return Err(StoreError::Database("weekly program write failed".into()));
            }
            self.inner.upsert_weekly_programs(programs).await
        }
    }

    #[tokio::test]
    async fn clean_run_counts_everything() {
        let store = ScriptedStore::new(configs(2));
        let source = FakeSource::new(2, 14);
        let progress = RecordingPublisher::new(None);

        let summary = run_scraper(
            &store,
            &source,
            &progress,
            &ScrapeOptions::default(),
            &test_defaults(),
        )
        .await
        .unwrap();

        assert_eq!(summary.total_cinemas, 2);
        assert_eq!(summary.total_dates, 3);
        assert_eq!(summary.successful_cinemas, 2);
        assert_eq!(summary.failed_cinemas, 0);
        // 2 cinemas x 3 dates x 2 films, 2 showtimes each.
        assert_eq!(summary.total_films, 12);
        assert_eq!(summary.total_showtimes, 24);
        assert!(summary.errors.is_empty());

        // Film ids repeat across cinemas; showtime ids do not.
        assert_eq!(store.inner.film_count(), 6);
        assert_eq!(store.inner.showtime_count(), 24);
        // One program row per cinema/film pair.
        assert_eq!(store.inner.weekly_program_count(), 12);
    }

    #[tokio::test]
    async fn events_follow_start_then_end_order() {
        let store = ScriptedStore::new(configs(1));
        let source = FakeSource::new(1, 14);
        let progress = RecordingPublisher::new(None);

        run_scraper(
            &store,
            &source,
            &progress,
            &ScrapeOptions::default(),
            &test_defaults(),
        )
        .await
        .unwrap();

        let events = progress.events();
        assert!(matches!(events.first(), Some(ProgressEvent::Started { .. })));
        assert!(matches!(events.last(), Some(ProgressEvent::Completed { .. })));

        // Every end event must come after its matching start.
        let position = |predicate: fn(&ProgressEvent) -> bool| {
            events.iter().position(predicate).expect("event missing")
        };
        let cinema_start = position(|e| matches!(e, ProgressEvent::CinemaStarted { .. }));
        let cinema_end = position(|e| matches!(e, ProgressEvent::CinemaCompleted { .. }));
        let date_start = position(|e| matches!(e, ProgressEvent::DateStarted { .. }));
        let date_end = position(|e| matches!(e, ProgressEvent::DateCompleted { .. }));
        let film_start = position(|e| matches!(e, ProgressEvent::FilmStarted { .. }));
        let film_end = position(|e| matches!(e, ProgressEvent::FilmCompleted { .. }));
        assert!(cinema_start < date_start);
        assert!(date_start < film_start);
        assert!(film_start < film_end);
        assert!(film_end < date_end);
        assert!(date_end < cinema_end);
    }

    #[tokio::test]
    async fn metadata_failure_fails_only_that_cinema() {
        let store = ScriptedStore::new(configs(3));
        let mut source = FakeSource::new(1, 14);
        source.fail_meta.insert("C2".into());
        let progress = RecordingPublisher::new(None);

        let summary = run_scraper(
            &store,
            &source,
            &progress,
            &ScrapeOptions::default(),
            &test_defaults(),
        )
        .await
        .unwrap();

        assert_eq!(summary.successful_cinemas, 2);
        assert_eq!(summary.failed_cinemas, 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].cinema_name, "Cinema 2");
        assert!(summary.errors[0].date.is_none());

        // The failed cinema still got a terminating event.
        assert!(progress.events().iter().any(|e| matches!(
            e,
            ProgressEvent::CinemaFailed { cinema_name, .. } if cinema_name == "Cinema 2"
        )));
    }

    #[tokio::test]
    async fn failed_dates_do_not_abort_the_cinema() {
        let store = ScriptedStore::new(configs(1));
        let mut source = FakeSource::new(1, 14);
        source.fail_days.insert(("C1".into(), today()));
        let progress = RecordingPublisher::new(None);

        let summary = run_scraper(
            &store,
            &source,
            &progress,
            &ScrapeOptions::default(),
            &test_defaults(),
        )
        .await
        .unwrap();

        // Two of three dates succeeded; the cinema counts as successful.
        assert_eq!(summary.successful_cinemas, 1);
        assert_eq!(summary.failed_cinemas, 0);
        assert_eq!(summary.total_films, 2);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].date, Some(today()));
    }

    #[tokio::test]
    async fn cinema_with_zero_successful_dates_discards_partial_counts() {
        let mut store = ScriptedStore::new(configs(1));
        // Every date fails after its films were already parsed and upserted:
        // the weekly-program batch write throws at the end of each date.
        store.fail_weekly = true;
        let source = FakeSource::new(2, 14);
        let progress = RecordingPublisher::new(None);

        let summary = run_scraper(
            &store,
            &source,
            &progress,
            &ScrapeOptions::default(),
            &test_defaults(),
        )
        .await
        .unwrap();

        assert_eq!(summary.successful_cinemas, 0);
        assert_eq!(summary.failed_cinemas, 1);
        // Films reached storage, but the summary reports none of them.
        assert_eq!(summary.total_films, 0);
        assert_eq!(summary.total_showtimes, 0);
        assert!(store.inner.film_count() > 0);
        // Three date errors plus the cinema-level entry.
        assert_eq!(summary.errors.len(), 4);
        assert!(progress
            .events()
            .iter()
            .any(|e| matches!(e, ProgressEvent::CinemaFailed { .. })));
    }

    #[tokio::test]
    async fn film_failure_does_not_abort_the_date() {
        let mut store = ScriptedStore::new(configs(1));
        let source = FakeSource::new(2, 14);
        // First film of the first day fails to upsert.
        store
            .fail_film_upserts
            .insert(FakeSource::film_id(today(), 0));
        let progress = RecordingPublisher::new(None);

        let summary = run_scraper(
            &store,
            &source,
            &progress,
            &ScrapeOptions {
                days: Some(1),
                ..Default::default()
            },
            &test_defaults(),
        )
        .await
        .unwrap();

        assert_eq!(summary.successful_cinemas, 1);
        assert_eq!(summary.total_films, 1);
        assert_eq!(summary.total_showtimes, 2);

        let events = progress.events();
        assert!(events
            .iter()
            .any(|e| matches!(e, ProgressEvent::FilmFailed { .. })));
        assert!(events.iter().any(
            |e| matches!(e, ProgressEvent::DateCompleted { films_count, .. } if *films_count == 1)
        ));
    }

    #[tokio::test]
    async fn stale_date_is_surfaced_not_stored() {
        let store = ScriptedStore::new(configs(1));
        let mut source = FakeSource::new(1, 14);
        let stale_date = today() + chrono::Duration::days(2);
        source
            .stale_days
            .insert(("C1".into(), stale_date), today());
        let progress = RecordingPublisher::new(None);

        let summary = run_scraper(
            &store,
            &source,
            &progress,
            &ScrapeOptions::default(),
            &test_defaults(),
        )
        .await
        .unwrap();

        // Two clean dates keep the cinema successful; the stale one is an
        // itemized error and contributed nothing.
        assert_eq!(summary.successful_cinemas, 1);
        assert_eq!(summary.total_films, 2);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].error.contains("stale"));
        assert!(progress.events().iter().any(|e| matches!(
            e,
            ProgressEvent::DateStale { date, actual_date: Some(actual), .. }
                if *date == stale_date && *actual == today()
        )));
    }

    #[tokio::test]
    async fn unpublished_dates_are_skipped_without_penalty() {
        let store = ScriptedStore::new(configs(1));
        // Only today is published; the other wanted dates are simply skipped.
        let source = FakeSource::new(1, 1);
        let progress = RecordingPublisher::new(None);

        let summary = run_scraper(
            &store,
            &source,
            &progress,
            &ScrapeOptions::default(),
            &test_defaults(),
        )
        .await
        .unwrap();

        assert_eq!(summary.successful_cinemas, 1);
        assert_eq!(summary.failed_cinemas, 0);
        assert_eq!(summary.total_films, 1);
        assert!(summary.errors.is_empty());

        let date_starts = progress
            .events()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::DateStarted { .. }))
            .count();
        assert_eq!(date_starts, 1);
    }

    #[tokio::test]
    async fn film_filter_restricts_the_crawl() {
        let store = ScriptedStore::new(configs(1));
        let source = FakeSource::new(3, 14);
        let progress = RecordingPublisher::new(None);
        let wanted = FakeSource::film_id(today(), 1);

        let summary = run_scraper(
            &store,
            &source,
            &progress,
            &ScrapeOptions {
                days: Some(1),
                film_id: Some(wanted),
                ..Default::default()
            },
            &test_defaults(),
        )
        .await
        .unwrap();

        assert_eq!(summary.total_films, 1);
        assert_eq!(store.inner.film_count(), 1);
    }

    #[tokio::test]
    async fn configuration_failure_is_fatal() {
        let mut store = ScriptedStore::new(configs(1));
        store.fail_configs = true;
        let source = FakeSource::new(1, 14);
        let progress = RecordingPublisher::new(None);

        let result = run_scraper(
            &store,
            &source,
            &progress,
            &ScrapeOptions::default(),
            &test_defaults(),
        )
        .await;

        assert!(matches!(result, Err(ScrapeError::Configuration(_))));
        let events = progress.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ProgressEvent::Failed { .. }));
    }
}
