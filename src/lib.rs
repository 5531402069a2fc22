//! # bundle-dl
//!
//! Reconstructs a remote application's asset tree from its compact bundle
//! manifests and packs it into one zip archive per bundle.
//!
//! ## Pipeline
//!
//! - [`decoder`] - Expands packed 22-character identifiers to canonical form
//! - [`manifest`] - Bundle manifest model and JSON loading
//! - [`resolver`] - Turns version tables into concrete download tasks
//! - [`downloader`] - Bounded-concurrency fetching with timeout and retry
//! - [`archive`] - Collects found assets and writes the bundle archive
//! - [`orchestrator`] - Runs the above per manifest and reports the outcome
//!
//! ## Quick Start
//!
//! ```no_run
//! use bundle_dl::{BundleDownloader, Config, Manifest, ServerBase};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = BundleDownloader::new(Config::default())?;
//!     let server = ServerBase::parse("https://cdn.example.com/game/v1")?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let manifest = Manifest::from_path("config.json".as_ref())?;
//!     let report = downloader.process_manifest(&manifest, &server).await?;
//!     println!("{} files in {}", report.found(), report.archive_path.display());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Bundle archive assembly
pub mod archive;
/// Configuration types
pub mod config;
/// Compact identifier decoding
pub mod decoder;
/// Download engine, fetchers and progress
pub mod downloader;
/// Error types
pub mod error;
/// Bundle manifest model
pub mod manifest;
/// Per-bundle orchestration
pub mod orchestrator;
/// Manifest to download task resolution
pub mod resolver;
/// Retry logic with configurable backoff
pub mod retry;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use archive::ArchiveAssembler;
pub use config::{Config, DownloadConfig, OutputConfig, RetryConfig};
pub use decoder::decode_uuid;
pub use downloader::{AssetFetcher, DownloadEngine, EngineSettings, HttpFetcher, Progress};
pub use error::{Error, FetchError, ManifestError, Result};
pub use manifest::{GroupSkip, IdentifierTable, Manifest, VersionEntry};
pub use orchestrator::{BatchOutcome, BundleDownloader, ManifestSource};
pub use resolver::{ResolvedGroup, ServerBase, resolve_groups, resolve_tasks};
pub use types::{
    BundleReport, DownloadResult, DownloadTask, Event, FetchOutcome, GroupKind, GroupReport,
};
