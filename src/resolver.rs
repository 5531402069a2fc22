//! Expansion of a manifest's version lists into concrete download tasks

use crate::decoder::decode_uuid;
use crate::error::{Error, ManifestError, Result};
use crate::manifest::{Group, GroupSkip, Manifest, VersionEntry};
use crate::types::{DownloadTask, GroupKind};
use url::Url;

/// Validated server base URL, without trailing slash
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerBase(String);

impl ServerBase {
    /// Parse an absolute `http`/`https` base URL
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw).map_err(|e| Error::Config {
            message: format!("invalid server URL '{raw}': {e}"),
            key: Some("server".into()),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config {
                message: format!("server URL must be http or https, got '{}'", url.scheme()),
                key: Some("server".into()),
            });
        }
        Ok(Self(raw.trim_end_matches('/').to_string()))
    }

    /// The base URL as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{server}/assets/{bundle}/config.{hash}.json`
    pub fn bundle_config_url(&self, bundle: &str, version_hash: &str) -> String {
        format!("{}/assets/{bundle}/config.{version_hash}.json", self.0)
    }
}

impl std::fmt::Display for ServerBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of resolving one group of a manifest
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedGroup {
    /// The group produced download tasks
    Tasks {
        /// Group kind
        kind: GroupKind,
        /// Tasks in version-list order, then extension order
        tasks: Vec<DownloadTask>,
    },
    /// The group cannot be processed
    Skipped {
        /// Group kind
        kind: GroupKind,
        /// Why it was skipped
        reason: GroupSkip,
    },
}

impl ResolvedGroup {
    /// Group kind
    pub fn kind(&self) -> GroupKind {
        match self {
            ResolvedGroup::Tasks { kind, .. } | ResolvedGroup::Skipped { kind, .. } => *kind,
        }
    }
}

/// Resolve every group of `manifest`, import group first
///
/// Groups without a base name or versions come back as
/// [`ResolvedGroup::Skipped`]. An identifier index outside the table fails the
/// whole manifest before any task is handed out.
pub fn resolve_groups(
    manifest: &Manifest,
    server: &ServerBase,
    extensions: &[String],
) -> Result<Vec<ResolvedGroup>> {
    GroupKind::ALL
        .into_iter()
        .map(|kind| match manifest.group(kind) {
            Ok(group) => Ok(ResolvedGroup::Tasks {
                kind,
                tasks: resolve_group(manifest, group, server, extensions)?,
            }),
            Err(reason) => {
                tracing::warn!(bundle = %manifest.name, group = %kind, reason = %reason, "Skipping group");
                Ok(ResolvedGroup::Skipped { kind, reason })
            }
        })
        .collect()
}

/// Tasks of every processable group of `manifest`, flattened in group order
pub fn resolve_tasks(
    manifest: &Manifest,
    server: &ServerBase,
    extensions: &[String],
) -> Result<Vec<DownloadTask>> {
    Ok(resolve_groups(manifest, server, extensions)?
        .into_iter()
        .flat_map(|resolved| match resolved {
            ResolvedGroup::Tasks { tasks, .. } => tasks,
            ResolvedGroup::Skipped { .. } => Vec::new(),
        })
        .collect())
}

/// Resolve one group into `versions.len() * extensions.len()` tasks
pub fn resolve_group(
    manifest: &Manifest,
    group: Group<'_>,
    server: &ServerBase,
    extensions: &[String],
) -> Result<Vec<DownloadTask>> {
    let mut tasks = Vec::with_capacity(group.versions.len() * extensions.len());

    for entry in group.versions {
        let stem = match entry {
            VersionEntry::Indexed { index, .. } => {
                let compact = manifest.identifiers.get(*index).ok_or_else(|| {
                    ManifestError::IdentifierIndexOutOfRange {
                        group: group.kind.to_string(),
                        index: *index,
                        table_len: manifest.identifiers.len(),
                    }
                })?;
                decode_uuid(compact)
            }
            VersionEntry::Named { name, .. } => name.clone(),
        };
        let prefix = shard_prefix(&stem);
        let relative = format!(
            "{}/{}/{}/{}.{}",
            manifest.name,
            group.base,
            prefix,
            stem,
            entry.hash()
        );

        for ext in extensions {
            let archive_path = format!("{relative}{ext}");
            tasks.push(DownloadTask {
                remote_url: format!("{}/assets/{archive_path}", server.as_str()),
                archive_path,
                group: group.kind,
            });
        }
    }

    tracing::info!(
        bundle = %manifest.name,
        group = %group.kind,
        tasks = tasks.len(),
        "Created download tasks"
    );
    Ok(tasks)
}

/// First two characters of a stem, used as an intermediate directory
fn shard_prefix(stem: &str) -> &str {
    match stem.char_indices().nth(2) {
        Some((end, _)) => &stem[..end],
        None => stem,
    }
}
