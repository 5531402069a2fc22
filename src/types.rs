//! Core types for bundle-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::FetchError;

/// Named partition of a manifest's assets
///
/// Each group has its own base path segment (`importBase`, `nativeBase`) and
/// its own version list. Groups are always processed in [`GroupKind::ALL`] order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    /// Imported (serialized) assets
    Import,
    /// Native (raw file) assets
    Native,
}

impl GroupKind {
    /// Processing order of all groups
    pub const ALL: [GroupKind; 2] = [GroupKind::Import, GroupKind::Native];

    /// Key of the group in the manifest's `versions` map
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKind::Import => "import",
            GroupKind::Native => "native",
        }
    }

    /// Manifest field holding the group's base path segment
    pub fn base_field(&self) -> &'static str {
        match self {
            GroupKind::Import => "importBase",
            GroupKind::Native => "nativeBase",
        }
    }
}

impl std::fmt::Display for GroupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote file to probe
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadTask {
    /// Absolute URL fetched with a plain GET
    pub remote_url: String,
    /// Relative path of the entry inside the output archive
    pub archive_path: String,
    /// Group the task was generated for
    pub group: GroupKind,
}

/// What a single fetch produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The object exists; its body
    Found(Vec<u8>),
    /// The server answered 404; expected for most extension probes
    NotFound,
}

impl FetchOutcome {
    /// Whether the remote object existed
    pub fn is_found(&self) -> bool {
        matches!(self, FetchOutcome::Found(_))
    }
}

/// Result of one [`DownloadTask`]
#[derive(Clone, Debug)]
pub struct DownloadResult {
    /// Archive path of the originating task
    pub archive_path: String,
    /// Payload or absence
    pub outcome: FetchOutcome,
    /// Attempts made, including the first (retries = attempts - 1)
    pub attempts: u32,
    /// Last error when a bounded retry policy gave up; `outcome` is then `NotFound`
    pub error: Option<FetchError>,
}

impl DownloadResult {
    /// Whether the asset was found
    pub fn is_found(&self) -> bool {
        self.outcome.is_found()
    }

    /// Consume the result, returning `(path, payload)` when found
    pub fn into_found(self) -> Option<(String, Vec<u8>)> {
        match self.outcome {
            FetchOutcome::Found(payload) => Some((self.archive_path, payload)),
            FetchOutcome::NotFound => None,
        }
    }
}

/// Summary of one group of a manifest
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupReport {
    /// Tasks generated for the group
    pub tasks: usize,
    /// Tasks whose asset existed
    pub found: usize,
    /// Tasks without payload (404, or abandoned by a bounded retry policy)
    pub not_found: usize,
}

/// Summary of one processed manifest
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleReport {
    /// Bundle (manifest) name
    pub bundle: String,
    /// Per-group counts, in processing order; skipped groups are absent
    pub groups: Vec<(GroupKind, GroupReport)>,
    /// Location of the written archive
    pub archive_path: PathBuf,
}

impl BundleReport {
    /// Total tasks over all groups
    pub fn tasks(&self) -> usize {
        self.groups.iter().map(|(_, g)| g.tasks).sum()
    }

    /// Total found assets over all groups (= archive entries)
    pub fn found(&self) -> usize {
        self.groups.iter().map(|(_, g)| g.found).sum()
    }

    /// Total 404 probes over all groups
    pub fn not_found(&self) -> usize {
        self.groups.iter().map(|(_, g)| g.not_found).sum()
    }
}

/// Event emitted while processing bundles
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Processing of a manifest began
    BundleStarted {
        /// Bundle name
        bundle: String,
        /// Number of entries in the identifier table
        identifiers: usize,
    },

    /// A group was skipped because its base name or version list is missing
    GroupSkipped {
        /// Bundle name
        bundle: String,
        /// Skipped group
        group: GroupKind,
        /// Why it was skipped
        reason: String,
    },

    /// Download tasks for a group were created and are about to run
    GroupStarted {
        /// Bundle name
        bundle: String,
        /// Group being downloaded
        group: GroupKind,
        /// Number of tasks
        tasks: usize,
    },

    /// A sub-batch finished
    Progress {
        /// Tasks finished so far in this run
        processed: usize,
        /// Total tasks in this run
        total: usize,
        /// Found assets so far
        found: usize,
        /// 404 probes so far
        missing: usize,
        /// Completion percentage (0.0 to 100.0)
        percent: f32,
        /// Tasks per second since the previous progress event
        items_per_second: f64,
    },

    /// All tasks of a group finished
    GroupComplete {
        /// Bundle name
        bundle: String,
        /// Finished group
        group: GroupKind,
        /// Found assets
        found: usize,
        /// 404 probes
        not_found: usize,
    },

    /// The bundle archive was written
    ArchiveWritten {
        /// Bundle name
        bundle: String,
        /// Archive location
        path: PathBuf,
        /// Number of entries
        files: usize,
    },

    /// No asset of the bundle was found; no archive written
    EmptyResultSet {
        /// Bundle name
        bundle: String,
    },

    /// Processing a manifest failed; the batch continues with the next one
    BundleFailed {
        /// Bundle name, or the manifest source if the name is unknown
        bundle: String,
        /// Error message
        error: String,
    },
}
