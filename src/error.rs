//! Error types for bundle-dl
//!
//! This module provides the error taxonomy for the library:
//! - Per-task fetch failures ([`FetchError`]), which are always transient and
//!   never escape the download engine while the retry policy allows more attempts
//! - Manifest structure problems ([`ManifestError`]), which abort one manifest only
//! - The empty-result condition, reported when no asset of a bundle was found
//! - Infrastructure failures (I/O, HTTP client, JSON, zip writing)

use std::time::Duration;
use thiserror::Error;

/// Result type alias for bundle-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bundle-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "sub_batch_size")
        key: Option<String>,
    },

    /// The manifest is missing required fields or has an invalid structure
    #[error("malformed manifest: {0}")]
    Manifest(#[from] ManifestError),

    /// No asset of the bundle was found in any group
    ///
    /// This usually means the manifest uses a naming scheme this tool does not
    /// understand. It is recoverable: no archive is written and the next
    /// manifest is processed normally.
    #[error("no files were found for bundle {bundle}")]
    EmptyResultSet {
        /// Name of the bundle that produced no results
        bundle: String,
    },

    /// A single asset fetch failed and the retry policy gave up
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing the output archive failed
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Machine-readable error code, stable across releases
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Manifest(ManifestError::NotFound { .. }) => "manifest_not_found",
            Error::Manifest(_) => "malformed_manifest",
            Error::EmptyResultSet { .. } => "empty_result_set",
            Error::Fetch(_) => "fetch_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Archive(_) => "archive_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// Whether the error only affects the manifest being processed
    ///
    /// Recoverable errors are logged by the orchestrator, which then moves on
    /// to the next manifest of a batch run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Manifest(_) | Error::EmptyResultSet { .. } | Error::Fetch(_)
        )
    }
}

/// Manifest structure errors
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A required top-level field is absent
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A top-level field is present but unusable
    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        /// Field name (`versions.<group>` for a group's version list)
        field: String,
        /// What was wrong with it
        reason: String,
    },

    /// A version list element is neither an identifier index nor a literal name
    #[error("invalid version entry in group {group} at position {position}: {reason}")]
    InvalidVersionEntry {
        /// Group the version list belongs to
        group: String,
        /// Position of the offending element in the flat version list
        position: usize,
        /// What was wrong with it
        reason: String,
    },

    /// A version entry references an identifier that is not in the table
    #[error("identifier index {index} in group {group} is out of range (table has {table_len} entries)")]
    IdentifierIndexOutOfRange {
        /// Group the version entry belongs to
        group: String,
        /// The referenced index
        index: usize,
        /// Length of the identifier table
        table_len: usize,
    },

    /// The remote bundle configuration does not exist
    #[error("bundle configuration not found at {url}")]
    NotFound {
        /// URL that returned 404
        url: String,
    },
}

/// Transient failure of a single remote fetch
///
/// A 404 response is not a `FetchError`: it is the expected
/// [`FetchOutcome::NotFound`](crate::types::FetchOutcome::NotFound).
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The server answered with a non-2xx status other than 404
    #[error("HTTP error! status: {0}")]
    Status(u16),

    /// The request did not complete within the per-task timeout
    #[error("download timeout after {0:?}")]
    Timeout(Duration),

    /// Connection, TLS, or body transfer failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(Error, &'static str, bool)> {
        vec![
            (
                Error::Config {
                    message: "must be at least 1".into(),
                    key: Some("sub_batch_size".into()),
                },
                "config_error",
                false,
            ),
            (
                Error::Manifest(ManifestError::MissingField("uuids")),
                "malformed_manifest",
                true,
            ),
            (
                Error::Manifest(ManifestError::InvalidField {
                    field: "name".into(),
                    reason: "'../x' is not a plain bundle name".into(),
                }),
                "malformed_manifest",
                true,
            ),
            (
                Error::Manifest(ManifestError::NotFound {
                    url: "http://example.com/assets/main/config.abc.json".into(),
                }),
                "manifest_not_found",
                true,
            ),
            (
                Error::EmptyResultSet {
                    bundle: "main".into(),
                },
                "empty_result_set",
                true,
            ),
            (Error::Fetch(FetchError::Status(503)), "fetch_error", true),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                "io_error",
                false,
            ),
            (Error::Other("boom".into()), "internal_error", false),
        ]
    }

    #[test]
    fn every_variant_has_expected_code_and_recoverability() {
        for (error, code, recoverable) in all_error_variants() {
            assert_eq!(error.error_code(), code, "wrong code for {error}");
            assert_eq!(
                error.is_recoverable(),
                recoverable,
                "wrong recoverability for {error}"
            );
        }
    }

    #[test]
    fn empty_result_set_message_names_the_bundle() {
        let error = Error::EmptyResultSet {
            bundle: "resources".into(),
        };
        assert_eq!(error.to_string(), "no files were found for bundle resources");
    }

    #[test]
    fn out_of_range_message_includes_table_size() {
        let error = ManifestError::IdentifierIndexOutOfRange {
            group: "import".into(),
            index: 7,
            table_len: 3,
        };
        let msg = error.to_string();
        assert!(msg.contains("index 7"), "got: {msg}");
        assert!(msg.contains("3 entries"), "got: {msg}");
    }

    #[test]
    fn status_fetch_error_mirrors_http_wording() {
        assert_eq!(FetchError::Status(500).to_string(), "HTTP error! status: 500");
    }
}
