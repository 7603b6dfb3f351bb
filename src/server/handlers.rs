//! API endpoint handlers.

use std::convert::Infallible;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::Stream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::AppState;
use crate::broker::ScrapeJob;
use crate::models::TriggerType;
use crate::repository::CatalogStore;
use crate::progress::{ObserverMessage, ProgressEvent};
use crate::scraper::ScrapeOptions;
use crate::session::SessionError;

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    pub film_id: Option<i64>,
}

/// Start a scrape, either in-process or by enqueuing a job for the worker.
pub async fn trigger_scrape(
    State(state): State<AppState>,
    body: Option<Json<TriggerRequest>>,
) -> impl IntoResponse {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    if let Some(film_id) = request.film_id {
        if film_id <= 0 {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "error": "film_id must be a positive integer",
                })),
            );
        }
    }

    let options = request.film_id.map(|film_id| ScrapeOptions {
        film_id: Some(film_id),
        ..Default::default()
    });

    // Queued deployment: create the report here, hand the job to the worker.
    if let Some(queue) = &state.queue {
        let report_id = match state.store.create_report(TriggerType::Manual).await {
            Ok(id) => id,
            Err(err) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "error": err.to_string() })),
                )
            }
        };
        let job = ScrapeJob {
            report_id,
            trigger_type: TriggerType::Manual,
            options,
        };
        return match queue.enqueue(&job).await {
            Ok(depth) => {
                info!(report_id, queue_depth = depth, "scrape job enqueued");
                (
                    StatusCode::OK,
                    Json(json!({
                        "success": true,
                        "data": { "report_id": report_id, "queue_depth": depth },
                    })),
                )
            }
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": err.to_string() })),
            ),
        };
    }

    // Local deployment: the session manager runs the scrape in this process.
    match state.manager.start(TriggerType::Manual, options).await {
        Ok(report_id) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "report_id": report_id, "message": "scrape started" },
            })),
        ),
        Err(SessionError::AlreadyRunning {
            started_at,
            trigger_type,
        }) => (
            StatusCode::CONFLICT,
            Json(json!({
                "success": false,
                "error": "a scrape is already in progress",
                "data": {
                    "current_scrape": {
                        "started_at": started_at.to_rfc3339(),
                        "trigger_type": trigger_type.as_str(),
                    },
                },
            })),
        ),
        Err(SessionError::Store(err)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": err.to_string() })),
        ),
    }
}

/// Current scrape status: active session plus the latest persisted report.
pub async fn scrape_status(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.manager.current_session().await;
    let latest = match state.store.latest_report().await {
        Ok(report) => report,
        Err(err) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": err.to_string() })),
            )
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": {
                "isRunning": session.is_some(),
                "currentSession": session,
                "latestReport": latest,
                "queued": state.queue.is_some(),
            },
        })),
    )
}

/// Server-sent progress events: the full backlog, then live events.
///
/// Detach is implicit: when the client goes away the channel closes and the
/// tracker drops the observer on its next send.
pub async fn scrape_progress(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let handle = state.tracker.attach();
    info!(
        observers = state.tracker.observer_count(),
        "progress observer connected"
    );

    let backlog = futures::stream::iter(
        handle
            .backlog
            .into_iter()
            .map(|event| Ok(frame_event(&event))),
    );
    let live = futures::stream::unfold(handle.rx, |mut rx| async move {
        rx.recv().await.map(|msg| (msg, rx))
    })
    .map(|msg| {
        Ok(match msg {
            ObserverMessage::Event(event) => frame_event(&event),
            ObserverMessage::Heartbeat => Event::default().comment("heartbeat"),
        })
    });

    Sse::new(backlog.chain(live))
}

fn frame_event(event: &ProgressEvent) -> Event {
    Event::default().data(serde_json::to_string(event).unwrap_or_default())
}
