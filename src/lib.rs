//! Cinescrape - cinema showtime harvesting and catalog service.
//!
//! Periodically harvests showtime listings from an external publisher and
//! keeps a normalized catalog up to date. The API server accepts scrape
//! requests and streams progress to observers; the worker drives the crawl,
//! with a Redis list + pub/sub broker crossing the process boundary between
//! them in the two-process deployment.

pub mod broker;
pub mod cli;
pub mod config;
pub mod models;
pub mod progress;
pub mod repository;
pub mod scraper;
pub mod server;
pub mod session;
pub mod source;
pub mod worker;
