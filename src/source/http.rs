//! HTTP implementation of [`ShowtimeSource`].
//!
//! Talks to the publisher's JSON endpoints. Only the documented payload
//! shape is decoded here; anything the upstream adds beyond it is ignored.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use super::{ShowtimeSource, SourceError};
use crate::models::{
    Cinema, CinemaConfig, DaySchedule, Film, FilmDetails, FilmShowtimes, Showtime, TheaterMeta,
};
use crate::scraper::week_start_for;

/// Desktop browser user agent; the publisher rejects obvious bot agents.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpShowtimeSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpShowtimeSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SourceError> {
        let base_url = base_url.into();
        url::Url::parse(&base_url)
            .map_err(|e| SourceError::Request(format!("invalid base url {base_url}: {e}")))?;
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))
    }
}

// Wire shapes of the publisher's JSON endpoints.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TheaterPayload {
    theater: TheaterNode,
    #[serde(default)]
    published_dates: Vec<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TheaterNode {
    name: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    screen_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShowtimesPayload {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    selected_date: Option<NaiveDate>,
    #[serde(default)]
    results: Vec<ShowtimesResult>,
}

#[derive(Debug, Deserialize)]
struct ShowtimesResult {
    movie: MovieNode,
    #[serde(default)]
    showtimes: Vec<ShowtimeNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MovieNode {
    internal_id: i64,
    title: String,
    #[serde(default)]
    original_title: Option<String>,
    /// Runtime in seconds.
    #[serde(default)]
    runtime: Option<u32>,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    director: Option<String>,
    #[serde(default)]
    synopsis: Option<String>,
    #[serde(default)]
    is_new_release: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShowtimeNode {
    internal_id: i64,
    /// Local start, ISO 8601 without offset: `2026-02-20T20:30:00`.
    starts_at: NaiveDateTime,
    #[serde(default)]
    diffusion_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoviePayload {
    /// Runtime in seconds.
    #[serde(default)]
    runtime: Option<u32>,
}

fn version_label(diffusion: Option<&str>) -> String {
    match diffusion {
        Some("ORIGINAL") => "VO".to_string(),
        Some("LOCAL") | Some("DUBBED") | None => "VF".to_string(),
        Some(other) => other.to_string(),
    }
}

fn runtime_minutes(seconds: Option<u32>) -> Option<u32> {
    seconds.filter(|s| *s > 0).map(|s| s / 60)
}

fn map_result(result: ShowtimesResult, cinema_id: &str) -> FilmShowtimes {
    let film = Film {
        id: result.movie.internal_id,
        title: result.movie.title,
        original_title: result.movie.original_title,
        duration_minutes: runtime_minutes(result.movie.runtime),
        genres: result.movie.genres,
        director: result.movie.director,
        synopsis: result.movie.synopsis,
    };
    let showtimes = result
        .showtimes
        .into_iter()
        .map(|node| {
            let date = node.starts_at.date();
            Showtime {
                id: node.internal_id.to_string(),
                film_id: film.id,
                cinema_id: cinema_id.to_string(),
                date,
                time: node.starts_at.format("%H:%M").to_string(),
                version: version_label(node.diffusion_version.as_deref()),
                week_start: week_start_for(date),
            }
        })
        .collect();
    FilmShowtimes {
        film,
        showtimes,
        is_new_this_week: result.movie.is_new_release,
    }
}

#[async_trait]
impl ShowtimeSource for HttpShowtimeSource {
    async fn fetch_theater_meta(&self, config: &CinemaConfig) -> Result<TheaterMeta, SourceError> {
        let url = format!("{}/theaters/{}", self.base_url, config.id);
        let payload: TheaterPayload = self.get_json(&url).await?;
        Ok(TheaterMeta {
            cinema: Cinema {
                id: config.id.clone(),
                name: payload.theater.name,
                address: payload.theater.address,
                city: payload.theater.city,
                screen_count: payload.theater.screen_count,
            },
            published_dates: payload.published_dates,
        })
    }

    async fn fetch_day(&self, cinema_id: &str, date: NaiveDate) -> Result<DaySchedule, SourceError> {
        let url = format!("{}/showtimes/theater-{}/d-{}", self.base_url, cinema_id, date);
        let payload: ShowtimesPayload = self.get_json(&url).await?;
        if payload.error {
            return Err(SourceError::Decode(
                payload
                    .message
                    .unwrap_or_else(|| "publisher flagged the response as an error".to_string()),
            ));
        }
        let films = payload
            .results
            .into_iter()
            .map(|result| map_result(result, cinema_id))
            .collect();
        Ok(DaySchedule {
            selected_date: payload.selected_date,
            films,
        })
    }

    async fn fetch_film_details(&self, film_id: i64) -> Result<FilmDetails, SourceError> {
        let url = format!("{}/movies/{}", self.base_url, film_id);
        let payload: MoviePayload = self.get_json(&url).await?;
        Ok(FilmDetails {
            duration_minutes: runtime_minutes(payload.runtime),
        })
    }
}
