//! SQLite-backed catalog store.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;

use super::{CatalogStore, StoreError};
use crate::models::{
    Cinema, CinemaConfig, Film, ReportUpdate, ScrapeReport, ScrapeStatus, Showtime, TriggerType,
    WeeklyProgram,
};

/// Catalog store on a single SQLite database file.
///
/// One connection guarded by an async mutex. The crawl writes sequentially;
/// only API reads contend for the lock.
pub struct SqliteCatalogStore {
    conn: Mutex<Connection>,
}

impl SqliteCatalogStore {
    /// Open (or create) the database at `path` and ensure the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cinema_configs (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                position INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS cinemas (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                address TEXT,
                city TEXT,
                screen_count INTEGER
            );
            CREATE TABLE IF NOT EXISTS films (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                original_title TEXT,
                duration_minutes INTEGER,
                genres TEXT NOT NULL DEFAULT '[]',
                director TEXT,
                synopsis TEXT
            );
            CREATE TABLE IF NOT EXISTS showtimes (
                id TEXT PRIMARY KEY,
                film_id INTEGER NOT NULL,
                cinema_id TEXT NOT NULL,
                date TEXT NOT NULL,
                time TEXT NOT NULL,
                version TEXT NOT NULL,
                week_start TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_showtimes_cinema_date
                ON showtimes (cinema_id, date);
            CREATE TABLE IF NOT EXISTS weekly_programs (
                cinema_id TEXT NOT NULL,
                film_id INTEGER NOT NULL,
                week_start TEXT NOT NULL,
                is_new_this_week INTEGER NOT NULL DEFAULT 0,
                scraped_at TEXT NOT NULL,
                PRIMARY KEY (cinema_id, film_id, week_start)
            );
            CREATE TABLE IF NOT EXISTS scrape_reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                status TEXT NOT NULL,
                trigger_type TEXT NOT NULL,
                total_cinemas INTEGER NOT NULL DEFAULT 0,
                successful_cinemas INTEGER NOT NULL DEFAULT 0,
                failed_cinemas INTEGER NOT NULL DEFAULT 0,
                total_films INTEGER NOT NULL DEFAULT 0,
                total_showtimes INTEGER NOT NULL DEFAULT 0,
                errors TEXT NOT NULL DEFAULT '[]',
                progress_log TEXT NOT NULL DEFAULT '[]'
            );
        "#,
        )?;
        Ok(())
    }

    fn report_from_row(row: &Row<'_>) -> rusqlite::Result<ScrapeReport> {
        let status: String = row.get("status")?;
        let trigger: String = row.get("trigger_type")?;
        let errors: String = row.get("errors")?;
        let progress_log: String = row.get("progress_log")?;
        Ok(ScrapeReport {
            id: row.get("id")?,
            started_at: parse_datetime(&row.get::<_, String>("started_at")?),
            completed_at: row
                .get::<_, Option<String>>("completed_at")?
                .map(|s| parse_datetime(&s)),
            status: ScrapeStatus::parse(&status).unwrap_or(ScrapeStatus::Failed),
            trigger_type: TriggerType::parse(&trigger).unwrap_or(TriggerType::Manual),
            total_cinemas: row.get("total_cinemas")?,
            successful_cinemas: row.get("successful_cinemas")?,
            failed_cinemas: row.get("failed_cinemas")?,
            total_films: row.get("total_films")?,
            total_showtimes: row.get("total_showtimes")?,
            errors: serde_json::from_str(&errors).unwrap_or_default(),
            progress_log: serde_json::from_str(&progress_log).unwrap_or_default(),
        })
    }
}

/// Parse an RFC 3339 datetime from the database, defaulting to the epoch.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn create_report(&self, trigger: TriggerType) -> Result<i64, StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO scrape_reports (started_at, status, trigger_type) VALUES (?1, ?2, ?3)",
            params![
                Utc::now().to_rfc3339(),
                ScrapeStatus::Running.as_str(),
                trigger.as_str()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn update_report(&self, id: i64, update: ReportUpdate) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;

        let mut fields: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(status) = update.status {
            fields.push("status = ?");
            values.push(Box::new(status.as_str()));
        }
        if let Some(completed_at) = update.completed_at {
            fields.push("completed_at = ?");
            values.push(Box::new(completed_at.to_rfc3339()));
        }
        if let Some(n) = update.total_cinemas {
            fields.push("total_cinemas = ?");
            values.push(Box::new(n));
        }
        if let Some(n) = update.successful_cinemas {
            fields.push("successful_cinemas = ?");
            values.push(Box::new(n));
        }
        if let Some(n) = update.failed_cinemas {
            fields.push("failed_cinemas = ?");
            values.push(Box::new(n));
        }
        if let Some(n) = update.total_films {
            fields.push("total_films = ?");
            values.push(Box::new(n));
        }
        if let Some(n) = update.total_showtimes {
            fields.push("total_showtimes = ?");
            values.push(Box::new(n));
        }
        if let Some(errors) = &update.errors {
            fields.push("errors = ?");
            values.push(Box::new(
                serde_json::to_string(errors).map_err(|e| StoreError::Database(e.to_string()))?,
            ));
        }
        if let Some(log) = &update.progress_log {
            fields.push("progress_log = ?");
            values.push(Box::new(
                serde_json::to_string(log).map_err(|e| StoreError::Database(e.to_string()))?,
            ));
        }
        if fields.is_empty() {
            return Ok(());
        }

        values.push(Box::new(id));
        let sql = format!(
            "UPDATE scrape_reports SET {} WHERE id = ?",
            fields.join(", ")
        );
        let changed = conn.execute(
            &sql,
            rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
        )?;
        if changed == 0 {
            return Err(StoreError::ReportNotFound(id));
        }
        Ok(())
    }

    async fn get_report(&self, id: i64) -> Result<Option<ScrapeReport>, StoreError> {
        let conn = self.conn.lock().await;
        let report = conn
            .query_row(
                "SELECT * FROM scrape_reports WHERE id = ?1",
                params![id],
                Self::report_from_row,
            )
            .optional()?;
        Ok(report)
    }

    async fn latest_report(&self) -> Result<Option<ScrapeReport>, StoreError> {
        let conn = self.conn.lock().await;
        let report = conn
            .query_row(
                "SELECT * FROM scrape_reports ORDER BY started_at DESC, id DESC LIMIT 1",
                [],
                Self::report_from_row,
            )
            .optional()?;
        Ok(report)
    }

    async fn cinema_configs(&self) -> Result<Vec<CinemaConfig>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT id, name, url FROM cinema_configs ORDER BY position, id")?;
        let configs = stmt
            .query_map([], |row| {
                Ok(CinemaConfig {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    url: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(configs)
    }

    async fn upsert_cinema_config(&self, config: &CinemaConfig) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO cinema_configs (id, name, url, position)
               VALUES (?1, ?2, ?3, (SELECT COUNT(*) FROM cinema_configs))
               ON CONFLICT(id) DO UPDATE SET name = excluded.name, url = excluded.url"#,
            params![config.id, config.name, config.url],
        )?;
        Ok(())
    }

    async fn upsert_cinema(&self, cinema: &Cinema) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO cinemas (id, name, address, city, screen_count)
               VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   address = excluded.address,
                   city = excluded.city,
                   screen_count = excluded.screen_count"#,
            params![
                cinema.id,
                cinema.name,
                cinema.address,
                cinema.city,
                cinema.screen_count
            ],
        )?;
        Ok(())
    }

    async fn get_film(&self, id: i64) -> Result<Option<Film>, StoreError> {
        let conn = self.conn.lock().await;
        let film = conn
            .query_row(
                "SELECT * FROM films WHERE id = ?1",
                params![id],
                |row| {
                    let genres: String = row.get("genres")?;
                    Ok(Film {
                        id: row.get("id")?,
                        title: row.get("title")?,
                        original_title: row.get("original_title")?,
                        duration_minutes: row.get("duration_minutes")?,
                        genres: serde_json::from_str(&genres).unwrap_or_default(),
                        director: row.get("director")?,
                        synopsis: row.get("synopsis")?,
                    })
                },
            )
            .optional()?;
        Ok(film)
    }

    async fn upsert_film(&self, film: &Film) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO films (id, title, original_title, duration_minutes, genres, director, synopsis)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
               ON CONFLICT(id) DO UPDATE SET
                   title = excluded.title,
                   original_title = excluded.original_title,
                   duration_minutes = COALESCE(excluded.duration_minutes, films.duration_minutes),
                   genres = excluded.genres,
                   director = excluded.director,
                   synopsis = excluded.synopsis"#,
            params![
                film.id,
                film.title,
                film.original_title,
                film.duration_minutes,
                serde_json::to_string(&film.genres)
                    .map_err(|e| StoreError::Database(e.to_string()))?,
                film.director,
                film.synopsis
            ],
        )?;
        Ok(())
    }

    async fn upsert_showtime(&self, showtime: &Showtime) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO showtimes (id, film_id, cinema_id, date, time, version, week_start)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
               ON CONFLICT(id) DO UPDATE SET
                   film_id = excluded.film_id,
                   cinema_id = excluded.cinema_id,
                   date = excluded.date,
                   time = excluded.time,
                   version = excluded.version,
                   week_start = excluded.week_start"#,
            params![
                showtime.id,
                showtime.film_id,
                showtime.cinema_id,
                showtime.date.to_string(),
                showtime.time,
                showtime.version,
                showtime.week_start.to_string()
            ],
        )?;
        Ok(())
    }

    async fn upsert_weekly_programs(&self, programs: &[WeeklyProgram]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for program in programs {
            tx.execute(
                r#"INSERT INTO weekly_programs (cinema_id, film_id, week_start, is_new_this_week, scraped_at)
                   VALUES (?1, ?2, ?3, ?4, ?5)
                   ON CONFLICT(cinema_id, film_id, week_start) DO UPDATE SET
                       is_new_this_week = excluded.is_new_this_week,
                       scraped_at = excluded.scraped_at"#,
                params![
                    program.cinema_id,
                    program.film_id,
                    program.week_start.to_string(),
                    program.is_new_this_week,
                    program.scraped_at.to_rfc3339()
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_film(id: i64) -> Film {
        Film {
            id,
            title: format!("Film {id}"),
            original_title: None,
            duration_minutes: Some(120),
            genres: vec!["Drame".into()],
            director: None,
            synopsis: None,
        }
    }

    fn sample_showtime(id: &str, film_id: i64) -> Showtime {
        Showtime {
            id: id.into(),
            film_id,
            cinema_id: "C1".into(),
            date: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
            time: "20:30".into(),
            version: "VO".into(),
            week_start: NaiveDate::from_ymd_opt(2026, 2, 18).unwrap(),
        }
    }

    #[tokio::test]
    async fn report_lifecycle_round_trips() {
        let store = SqliteCatalogStore::open_in_memory().unwrap();
        let id = store.create_report(TriggerType::Manual).await.unwrap();

        let report = store.get_report(id).await.unwrap().unwrap();
        assert_eq!(report.status, ScrapeStatus::Running);
        assert_eq!(report.trigger_type, TriggerType::Manual);
        assert!(report.completed_at.is_none());

        store
            .update_report(
                id,
                ReportUpdate {
                    status: Some(ScrapeStatus::PartialSuccess),
                    completed_at: Some(Utc::now()),
                    successful_cinemas: Some(1),
                    failed_cinemas: Some(1),
                    errors: Some(vec![crate::models::ScrapeErrorEntry::cinema(
                        "UGC", "metadata fetch failed",
                    )]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let report = store.get_report(id).await.unwrap().unwrap();
        assert_eq!(report.status, ScrapeStatus::PartialSuccess);
        assert!(report.completed_at.is_some());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].cinema_name, "UGC");
    }

    #[tokio::test]
    async fn updating_missing_report_is_an_error() {
        let store = SqliteCatalogStore::open_in_memory().unwrap();
        let result = store
            .update_report(
                42,
                ReportUpdate {
                    status: Some(ScrapeStatus::Failed),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::ReportNotFound(42))));
    }

    #[tokio::test]
    async fn latest_report_is_most_recent() {
        let store = SqliteCatalogStore::open_in_memory().unwrap();
        store.create_report(TriggerType::Manual).await.unwrap();
        let second = store.create_report(TriggerType::Cron).await.unwrap();
        let latest = store.latest_report().await.unwrap().unwrap();
        assert_eq!(latest.id, second);
    }

    #[tokio::test]
    async fn upserts_are_idempotent() {
        let store = SqliteCatalogStore::open_in_memory().unwrap();

        for _ in 0..2 {
            store.upsert_film(&sample_film(7)).await.unwrap();
            store.upsert_showtime(&sample_showtime("s1", 7)).await.unwrap();
        }

        let film = store.get_film(7).await.unwrap().unwrap();
        assert_eq!(film.title, "Film 7");

        let conn = store.conn.lock().await;
        let films: i64 = conn
            .query_row("SELECT COUNT(*) FROM films", [], |r| r.get(0))
            .unwrap();
        let showtimes: i64 = conn
            .query_row("SELECT COUNT(*) FROM showtimes", [], |r| r.get(0))
            .unwrap();
        assert_eq!(films, 1);
        assert_eq!(showtimes, 1);
    }

    #[tokio::test]
    async fn film_upsert_keeps_known_duration() {
        let store = SqliteCatalogStore::open_in_memory().unwrap();
        store.upsert_film(&sample_film(9)).await.unwrap();

        let mut without_duration = sample_film(9);
        without_duration.duration_minutes = None;
        store.upsert_film(&without_duration).await.unwrap();

        let film = store.get_film(9).await.unwrap().unwrap();
        assert_eq!(film.duration_minutes, Some(120));
    }

    #[tokio::test]
    async fn cinema_configs_preserve_order() {
        let store = SqliteCatalogStore::open_in_memory().unwrap();
        for (id, name) in [("W1", "Rex"), ("W2", "MK2"), ("W3", "UGC")] {
            store
                .upsert_cinema_config(&CinemaConfig {
                    id: id.into(),
                    name: name.into(),
                    url: format!("https://example.org/{id}"),
                })
                .await
                .unwrap();
        }
        let configs = store.cinema_configs().await.unwrap();
        let names: Vec<&str> = configs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Rex", "MK2", "UGC"]);
    }
}
