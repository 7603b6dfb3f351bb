//! `cinescrape init` - create the database and seed cinema configs.

use crate::config::Settings;
use crate::repository::CatalogStore;

pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    let store = settings.open_store()?;

    for cinema in &settings.cinemas {
        store.upsert_cinema_config(cinema).await?;
        tracing::info!(id = %cinema.id, name = %cinema.name, "cinema configured");
    }

    println!(
        "Initialized {} with {} cinema(s)",
        settings.database_path.display(),
        settings.cinemas.len()
    );
    Ok(())
}
