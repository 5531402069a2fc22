//! Download engine split into focused submodules.
//!
//! - [`fetcher`] - The [`AssetFetcher`] seam and its reqwest implementation
//! - [`engine`] - Chunked, sub-batched execution with timeout and retry
//! - [`progress`] - Progress snapshots reported after each sub-batch

pub mod engine;
pub mod fetcher;
pub mod progress;

pub use engine::{DownloadEngine, EngineSettings};
pub use fetcher::{AssetFetcher, HttpFetcher};
pub use progress::{Progress, TaskOutcome};
