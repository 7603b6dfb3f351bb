//! Progress event vocabulary and fan-out.
//!
//! The scrape algorithm emits [`ProgressEvent`]s through a
//! [`ProgressPublisher`]; the [`ProgressTracker`] is the observer-facing bus
//! that keeps a replayable backlog and fans events out to any number of live
//! subscribers. The Redis-backed publisher in [`crate::broker`] satisfies the
//! same emit contract across a process boundary.

mod events;
mod publisher;
mod tracker;

pub use events::{ProgressEvent, ScrapeSummary};
pub use publisher::{FanoutPublisher, ProgressPublisher, RecordingPublisher};
pub use tracker::{ObserverHandle, ObserverMessage, ProgressTracker};
