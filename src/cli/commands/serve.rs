//! `cinescrape serve` - run the API server.

use crate::config::Settings;
use crate::server;

pub async fn cmd_serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    server::serve(settings, host, port).await
}
