//! `cinescrape worker` - run the scrape worker in one of its four modes.

use std::sync::Arc;

use crate::broker::{JobQueue, RedisProgressPublisher};
use crate::config::Settings;
use crate::progress::ProgressTracker;
use crate::repository::CatalogStore;
use crate::session::ScrapeManager;
use crate::source::HttpShowtimeSource;
use crate::worker::{RunMode, Worker};

pub async fn cmd_worker(
    settings: &Settings,
    mode: RunMode,
    film_id: Option<i64>,
) -> anyhow::Result<()> {
    let store: Arc<dyn CatalogStore> = Arc::new(settings.open_store()?);
    let source = Arc::new(HttpShowtimeSource::new(&settings.source_base_url)?);

    let mut manager = ScrapeManager::new(
        Arc::clone(&store),
        source,
        ProgressTracker::new(),
        settings.scrape_defaults(),
    );

    // With a broker configured, progress is mirrored onto the pub/sub
    // channel so API-server observers can follow this worker's runs.
    let queue = match &settings.redis_url {
        Some(url) => {
            manager = manager.with_relay(Arc::new(RedisProgressPublisher::connect(url).await?));
            Some(JobQueue::connect(url).await?)
        }
        None => None,
    };

    let worker = Worker::new(
        Arc::new(manager),
        store,
        queue,
        settings.cron_schedule.clone(),
        film_id,
    );
    worker.run(mode).await
}
