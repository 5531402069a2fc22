//! Common test utilities for bundle-dl integration tests

#![allow(dead_code)]

use bundle_dl::Config;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Compact identifier and its canonical form
pub const COMPACT_ID: &str = "fcmR3XADNLgJ1ByKhqcC5Z";
pub const CANONICAL_ID: &str = "fc991dd7-0033-4b80-9d41-c8a86a702e59";

/// Manifest with two import entries (one indexed, one named) and one native entry
pub const MAIN_MANIFEST: &str = r#"{
    "name": "main",
    "importBase": "import",
    "nativeBase": "native",
    "uuids": ["fcmR3XADNLgJ1ByKhqcC5Z", "0e95a9f8d"],
    "versions": {
        "import": [0, "5d3f2", "scene-main", "77a1c"],
        "native": [1, "0b9c1"]
    }
}"#;

/// Configuration probing two extensions with fast retries, writing into `output_dir`
pub fn test_config(output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.download.extensions = vec![".json".into(), ".png".into()];
    config.download.concurrency_limit = 4;
    config.download.sub_batch_size = 2;
    config.download.task_timeout = Duration::from_secs(5);
    config.retry.initial_delay = Duration::from_millis(10);
    config.output.output_dir = output_dir.to_path_buf();
    config
}

/// Read every entry of a zip archive into memory
pub fn read_archive(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let file = std::fs::File::open(path).expect("archive should exist");
    let mut archive = zip::ZipArchive::new(file).expect("archive should be a valid zip");
    let mut entries = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).expect("entry should be readable");
        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .expect("entry content should be readable");
        entries.insert(entry.name().to_string(), content);
    }
    entries
}
