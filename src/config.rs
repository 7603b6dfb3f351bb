//! Configuration: a flat TOML file plus environment overrides.
//!
//! Every field has a default, so the binary runs with no config file at
//! all. Environment variables win over the file; CLI flags win over both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::models::CinemaConfig;
use crate::repository::{SqliteCatalogStore, StoreError};
use crate::scraper::{ScrapeDefaults, ScrapeMode};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Redis URL. Unset means the single-process deployment: the API server
    /// runs scrapes itself and no queue/relay is wired.
    pub redis_url: Option<String>,
    /// Base URL of the external showtime publisher.
    pub source_base_url: String,
    pub host: String,
    pub port: u16,
    pub scrape_mode: ScrapeMode,
    pub scrape_days: u32,
    /// Pacing delay between upstream requests, in milliseconds.
    pub request_delay_ms: u64,
    /// Schedule for the cron worker mode (seconds-resolution cron).
    pub cron_schedule: String,
    /// Cinemas seeded into the database by `cinescrape init`.
    pub cinemas: Vec<CinemaConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("cinescrape.db"),
            redis_url: None,
            source_base_url: "https://www.allocine.fr/_".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3000,
            scrape_mode: ScrapeMode::FromTodayLimited,
            scrape_days: 7,
            request_delay_ms: 500,
            // Wednesday 08:00, when the new release week is published.
            cron_schedule: "0 0 8 * * Wed".to_string(),
            cinemas: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (or defaults when absent), then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("cannot read config file {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("invalid config file {}", path.display()))?
            }
            None => {
                let default_path = Path::new("cinescrape.toml");
                if default_path.exists() {
                    let raw = std::fs::read_to_string(default_path)?;
                    toml::from_str(&raw).context("invalid config file cinescrape.toml")?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env();
        Ok(settings)
    }

    fn apply_env(&mut self) {
        if let Ok(value) = std::env::var("CINESCRAPE_DB") {
            self.database_path = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("REDIS_URL") {
            self.redis_url = Some(value);
        }
        if let Ok(value) = std::env::var("SOURCE_BASE_URL") {
            self.source_base_url = value;
        }
        if let Ok(value) = std::env::var("PORT") {
            if let Ok(port) = value.parse() {
                self.port = port;
            }
        }
        if let Ok(value) = std::env::var("SCRAPE_MODE") {
            if let Some(mode) = parse_mode(&value) {
                self.scrape_mode = mode;
            }
        }
        if let Ok(value) = std::env::var("SCRAPE_DAYS") {
            if let Ok(days) = value.parse() {
                self.scrape_days = days;
            }
        }
        if let Ok(value) = std::env::var("CRON_SCHEDULE") {
            self.cron_schedule = value;
        }
    }

    /// Run defaults handed to the scrape algorithm.
    pub fn scrape_defaults(&self) -> ScrapeDefaults {
        ScrapeDefaults {
            mode: self.scrape_mode,
            days: Some(self.scrape_days),
            pacing: Duration::from_millis(self.request_delay_ms),
        }
    }

    pub fn open_store(&self) -> Result<SqliteCatalogStore, StoreError> {
        SqliteCatalogStore::open(&self.database_path)
    }
}

fn parse_mode(s: &str) -> Option<ScrapeMode> {
    match s {
        "weekly" => Some(ScrapeMode::Weekly),
        "from_today" => Some(ScrapeMode::FromToday),
        "from_today_limited" => Some(ScrapeMode::FromTodayLimited),
        _ => None,
    }
}
