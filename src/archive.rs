//! In-memory archive of fetched assets, flushed to a single zip file per bundle

use crate::error::{Error, Result};
use crate::types::DownloadResult;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Path-keyed collection of payloads destined for one bundle archive
///
/// Entries are kept sorted by path so the written archive is reproducible
/// regardless of the order downloads completed in.
#[derive(Debug, Default)]
pub struct ArchiveAssembler {
    entries: BTreeMap<String, Vec<u8>>,
}

impl ArchiveAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the entry at `path`
    pub fn add(&mut self, path: impl Into<String>, payload: Vec<u8>) {
        let path = path.into();
        if self.entries.insert(path.clone(), payload).is_some() {
            warn!(path = %path, "Duplicate archive path, keeping the last payload");
        }
    }

    /// Add every found result, ignoring misses; returns how many were added
    pub fn add_results(&mut self, results: impl IntoIterator<Item = DownloadResult>) -> usize {
        let mut added = 0;
        for (path, payload) in results.into_iter().filter_map(DownloadResult::into_found) {
            self.add(path, payload);
            added += 1;
        }
        added
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been added
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Archive file name for a bundle
    pub fn file_name(bundle: &str) -> String {
        format!("{bundle}-bundle.zip")
    }

    /// Write all entries to `{output_dir}/{bundle}-bundle.zip`
    ///
    /// The output directory is created if needed and an existing archive of
    /// the same name is replaced. Consumes the assembler.
    pub fn flush(self, output_dir: &Path, bundle: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir).map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to create output directory {}: {}",
                output_dir.display(),
                e
            )))
        })?;

        let archive_path = output_dir.join(Self::file_name(bundle));
        let file = std::fs::File::create(&archive_path).map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to create archive {}: {}",
                archive_path.display(),
                e
            )))
        })?;

        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        let count = self.entries.len();
        for (path, payload) in self.entries {
            debug!(path = %path, bytes = payload.len(), "Adding archive entry");
            writer.start_file(path, options)?;
            writer.write_all(&payload)?;
        }
        writer.finish()?;

        info!(path = %archive_path.display(), files = count, "Archive written");
        Ok(archive_path)
    }
}
