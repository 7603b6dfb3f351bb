//! In-memory catalog store for tests and local experimentation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::{CatalogStore, StoreError};
use crate::models::{
    Cinema, CinemaConfig, Film, ReportUpdate, ScrapeReport, ScrapeStatus, Showtime, TriggerType,
    WeeklyProgram,
};

#[derive(Default)]
struct State {
    reports: Vec<ScrapeReport>,
    configs: Vec<CinemaConfig>,
    cinemas: HashMap<String, Cinema>,
    films: HashMap<i64, Film>,
    showtimes: HashMap<String, Showtime>,
    weekly_programs: HashMap<(String, i64, String), WeeklyProgram>,
}

/// Catalog store backed by process memory. Same contract as the SQLite
/// store, nothing survives the process.
#[derive(Default)]
pub struct MemoryCatalogStore {
    state: Mutex<State>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the configured cinema list.
    pub fn with_cinemas(configs: Vec<CinemaConfig>) -> Self {
        let store = Self::new();
        store.state.lock().expect("store lock poisoned").configs = configs;
        store
    }

    pub fn film_count(&self) -> usize {
        self.state.lock().expect("store lock poisoned").films.len()
    }

    pub fn showtime_count(&self) -> usize {
        self.state.lock().expect("store lock poisoned").showtimes.len()
    }

    pub fn weekly_program_count(&self) -> usize {
        self.state.lock().expect("store lock poisoned").weekly_programs.len()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn create_report(&self, trigger: TriggerType) -> Result<i64, StoreError> {
        let mut state = self.state.lock().expect("store lock poisoned");
        let id = state.reports.len() as i64 + 1;
        state.reports.push(ScrapeReport {
            id,
            started_at: Utc::now(),
            completed_at: None,
            status: ScrapeStatus::Running,
            trigger_type: trigger,
            total_cinemas: 0,
            successful_cinemas: 0,
            failed_cinemas: 0,
            total_films: 0,
            total_showtimes: 0,
            errors: Vec::new(),
            progress_log: Vec::new(),
        });
        Ok(id)
    }

    async fn update_report(&self, id: i64, update: ReportUpdate) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store lock poisoned");
        let report = state
            .reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::ReportNotFound(id))?;
        if let Some(status) = update.status {
            report.status = status;
        }
        if let Some(completed_at) = update.completed_at {
            report.completed_at = Some(completed_at);
        }
        if let Some(n) = update.total_cinemas {
            report.total_cinemas = n;
        }
        if let Some(n) = update.successful_cinemas {
            report.successful_cinemas = n;
        }
        if let Some(n) = update.failed_cinemas {
            report.failed_cinemas = n;
        }
        if let Some(n) = update.total_films {
            report.total_films = n;
        }
        if let Some(n) = update.total_showtimes {
            report.total_showtimes = n;
        }
        if let Some(errors) = update.errors {
            report.errors = errors;
        }
        if let Some(log) = update.progress_log {
            report.progress_log = log;
        }
        Ok(())
    }

    async fn get_report(&self, id: i64) -> Result<Option<ScrapeReport>, StoreError> {
        let state = self.state.lock().expect("store lock poisoned");
        Ok(state.reports.iter().find(|r| r.id == id).cloned())
    }

    async fn latest_report(&self) -> Result<Option<ScrapeReport>, StoreError> {
        let state = self.state.lock().expect("store lock poisoned");
        Ok(state.reports.last().cloned())
    }

    async fn cinema_configs(&self) -> Result<Vec<CinemaConfig>, StoreError> {
        Ok(self.state.lock().expect("store lock poisoned").configs.clone())
    }

    async fn upsert_cinema_config(&self, config: &CinemaConfig) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store lock poisoned");
        match state.configs.iter_mut().find(|c| c.id == config.id) {
            Some(existing) => *existing = config.clone(),
            None => state.configs.push(config.clone()),
        }
        Ok(())
    }

    async fn upsert_cinema(&self, cinema: &Cinema) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store lock poisoned");
        state.cinemas.insert(cinema.id.clone(), cinema.clone());
        Ok(())
    }

    async fn get_film(&self, id: i64) -> Result<Option<Film>, StoreError> {
        Ok(self.state.lock().expect("store lock poisoned").films.get(&id).cloned())
    }

    async fn upsert_film(&self, film: &Film) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store lock poisoned");
        let mut film = film.clone();
        // Keep a previously known duration when the new row has none.
        if film.duration_minutes.is_none() {
            if let Some(existing) = state.films.get(&film.id) {
                film.duration_minutes = existing.duration_minutes;
            }
        }
        state.films.insert(film.id, film);
        Ok(())
    }

    async fn upsert_showtime(&self, showtime: &Showtime) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store lock poisoned");
        state.showtimes.insert(showtime.id.clone(), showtime.clone());
        Ok(())
    }

    async fn upsert_weekly_programs(&self, programs: &[WeeklyProgram]) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store lock poisoned");
        for program in programs {
            let key = (
                program.cinema_id.clone(),
                program.film_id,
                program.week_start.to_string(),
            );
            state.weekly_programs.insert(key, program.clone());
        }
        Ok(())
    }
}
