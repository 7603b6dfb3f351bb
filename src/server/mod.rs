//! API server for triggering scrapes and watching their progress.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::broker::{spawn_progress_relay, JobQueue, RedisProgressPublisher};
use crate::config::Settings;
use crate::progress::ProgressTracker;
use crate::repository::{CatalogStore, SqliteCatalogStore};
use crate::session::ScrapeManager;
use crate::source::HttpShowtimeSource;

/// Shared state for the API server.
///
/// `queue` selects the deployment: when present, trigger requests enqueue
/// jobs for a separate worker and progress arrives over the broker relay;
/// when absent, the session manager runs scrapes in this process.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CatalogStore>,
    pub manager: Arc<ScrapeManager>,
    pub tracker: ProgressTracker,
    pub queue: Option<JobQueue>,
}

/// Start the API server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let store: Arc<dyn CatalogStore> = Arc::new(SqliteCatalogStore::open(&settings.database_path)?);
    let source = Arc::new(HttpShowtimeSource::new(&settings.source_base_url)?);
    let tracker = ProgressTracker::new();

    let mut manager = ScrapeManager::new(
        Arc::clone(&store),
        source,
        tracker.clone(),
        settings.scrape_defaults(),
    );

    let queue = match &settings.redis_url {
        Some(url) => {
            // Queued deployment: relay worker progress into the local
            // tracker, and mirror in-process runs onto the broker channel.
            spawn_progress_relay(url.clone(), tracker.clone());
            manager = manager.with_relay(Arc::new(RedisProgressPublisher::connect(url).await?));
            Some(JobQueue::connect(url).await?)
        }
        None => None,
    };

    let state = AppState {
        store,
        manager: Arc::new(manager),
        tracker,
        queue,
    };
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
