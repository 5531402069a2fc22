//! Bundle manifest model and JSON loading
//!
//! A manifest (bundle `config.json`) looks like:
//!
//! ```json
//! {
//!   "name": "main",
//!   "importBase": "import",
//!   "nativeBase": "native",
//!   "uuids": ["fcmR3XADNLgJ1ByKhqcC5Z", "0e95a9f8d"],
//!   "versions": {
//!     "import": [0, "5d3f2", "scene", "77a1c"],
//!     "native": [1, "0b9c1"]
//!   }
//! }
//! ```
//!
//! Each version list is a flat sequence alternating an entry (identifier table
//! index or literal file stem) with its hash suffix.

use crate::error::{ManifestError, Result};
use crate::types::GroupKind;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Ordered table of compact identifiers, indexed by position
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentifierTable(Vec<String>);

impl IdentifierTable {
    /// Wrap a list of compact identifiers
    pub fn new(identifiers: Vec<String>) -> Self {
        Self(identifiers)
    }

    /// Compact identifier at `index`
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Number of identifiers
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One `(entry, hash)` pair of a version list
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionEntry {
    /// Entry referencing the identifier table
    Indexed {
        /// Position in the identifier table
        index: usize,
        /// Content hash suffix
        hash: String,
    },
    /// Entry naming the file stem directly
    Named {
        /// Literal file stem
        name: String,
        /// Content hash suffix
        hash: String,
    },
}

impl VersionEntry {
    /// Hash suffix of the entry
    pub fn hash(&self) -> &str {
        match self {
            VersionEntry::Indexed { hash, .. } | VersionEntry::Named { hash, .. } => hash,
        }
    }
}

/// Why a group is not processed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupSkip {
    /// `{group}Base` is absent or empty
    MissingBase,
    /// The group's version list is absent or empty
    NoVersions,
}

impl std::fmt::Display for GroupSkip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupSkip::MissingBase => f.write_str("base not found in bundle data"),
            GroupSkip::NoVersions => f.write_str("no versions found"),
        }
    }
}

/// A group that has both a base path segment and versions
#[derive(Clone, Copy, Debug)]
pub struct Group<'a> {
    /// Group kind
    pub kind: GroupKind,
    /// Base path segment
    pub base: &'a str,
    /// Version entries, in manifest order
    pub versions: &'a [VersionEntry],
}

/// Parsed bundle manifest; read-only once loaded
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    /// Bundle name
    pub name: String,
    /// Compact identifiers referenced by [`VersionEntry::Indexed`]
    pub identifiers: IdentifierTable,
    versions: HashMap<GroupKind, Vec<VersionEntry>>,
    bases: HashMap<GroupKind, String>,
}

#[derive(Deserialize)]
struct RawManifest {
    name: Option<String>,
    uuids: Option<Vec<String>>,
    versions: Option<HashMap<String, Value>>,
    /// `importBase`, `nativeBase` and everything this tool does not read
    #[serde(flatten)]
    rest: HashMap<String, Value>,
}

impl Manifest {
    /// Parse a manifest from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawManifest = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Parse a manifest from JSON bytes
    pub fn from_slice(json: &[u8]) -> Result<Self> {
        let raw: RawManifest = serde_json::from_slice(json)?;
        Self::from_raw(raw)
    }

    /// Read and parse a manifest file
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_slice(&bytes)
    }

    fn from_raw(raw: RawManifest) -> Result<Self> {
        let name = raw.name.ok_or(ManifestError::MissingField("name"))?;
        validate_name(&name)?;
        let uuids = raw.uuids.ok_or(ManifestError::MissingField("uuids"))?;
        let raw_versions = raw.versions.ok_or(ManifestError::MissingField("versions"))?;

        let mut versions = HashMap::new();
        let mut bases = HashMap::new();
        for kind in GroupKind::ALL {
            match raw_versions.get(kind.as_str()) {
                None | Some(Value::Null) => {}
                Some(Value::Array(list)) => {
                    versions.insert(kind, parse_version_list(kind, list)?);
                }
                Some(other) => {
                    return Err(ManifestError::InvalidField {
                        field: format!("versions.{kind}"),
                        reason: format!("expected an array, got {other}"),
                    }
                    .into());
                }
            }

            match raw.rest.get(kind.base_field()) {
                None | Some(Value::Null) => {}
                Some(Value::String(base)) => {
                    bases.insert(kind, base.clone());
                }
                Some(other) => {
                    return Err(ManifestError::InvalidField {
                        field: kind.base_field().to_string(),
                        reason: format!("expected a string, got {other}"),
                    }
                    .into());
                }
            }
        }

        Ok(Self {
            name,
            identifiers: IdentifierTable::new(uuids),
            versions,
            bases,
        })
    }

    /// Base path segment of a group, if present
    pub fn base(&self, kind: GroupKind) -> Option<&str> {
        self.bases.get(&kind).map(String::as_str)
    }

    /// Version entries of a group (empty if absent)
    pub fn versions(&self, kind: GroupKind) -> &[VersionEntry] {
        self.versions.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The group if it can be processed, otherwise why not
    pub fn group(&self, kind: GroupKind) -> std::result::Result<Group<'_>, GroupSkip> {
        let base = self
            .base(kind)
            .filter(|b| !b.is_empty())
            .ok_or(GroupSkip::MissingBase)?;
        let versions = self.versions(kind);
        if versions.is_empty() {
            return Err(GroupSkip::NoVersions);
        }
        Ok(Group {
            kind,
            base,
            versions,
        })
    }
}

/// The bundle name becomes a file name and a URL segment; it must be a single path component
fn validate_name(name: &str) -> std::result::Result<(), ManifestError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(ManifestError::InvalidField {
            field: "name".into(),
            reason: format!("'{name}' is not a plain bundle name"),
        });
    }
    Ok(())
}

/// Consume a flat `[entry, hash, entry, hash, ...]` list in adjacent pairs
fn parse_version_list(
    kind: GroupKind,
    list: &[Value],
) -> std::result::Result<Vec<VersionEntry>, ManifestError> {
    if list.len() % 2 != 0 {
        tracing::warn!(
            group = %kind,
            len = list.len(),
            "Version list has an unpaired trailing element, ignoring it"
        );
    }

    list.chunks_exact(2)
        .enumerate()
        .map(|(pair, items)| {
            let position = pair * 2;
            let invalid = |reason: String| ManifestError::InvalidVersionEntry {
                group: kind.to_string(),
                position,
                reason,
            };

            let hash = match &items[1] {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                other => return Err(invalid(format!("hash must be a string, got {other}"))),
            };

            match &items[0] {
                Value::Number(n) => {
                    let index = n
                        .as_u64()
                        .and_then(|i| usize::try_from(i).ok())
                        .ok_or_else(|| {
                            invalid(format!("index must be a non-negative integer, got {n}"))
                        })?;
                    Ok(VersionEntry::Indexed { index, hash })
                }
                Value::String(name) => Ok(VersionEntry::Named {
                    name: name.clone(),
                    hash,
                }),
                other => Err(invalid(format!(
                    "entry must be an index or a name, got {other}"
                ))),
            }
        })
        .collect()
}
