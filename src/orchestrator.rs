//! Per-bundle pipeline: manifest → tasks → downloads → archive
//!
//! [`BundleDownloader`] owns the configuration, the download engine and the
//! event channel. Groups of a manifest are processed in order, each group's
//! tasks running through the engine before the next group starts; all found
//! assets of a bundle are collected into one [`ArchiveAssembler`] and written
//! once at the end.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::archive::ArchiveAssembler;
use crate::config::Config;
use crate::downloader::{AssetFetcher, DownloadEngine, EngineSettings, HttpFetcher, Progress};
use crate::error::{Error, FetchError, ManifestError, Result};
use crate::manifest::Manifest;
use crate::resolver::{ResolvedGroup, ServerBase, resolve_groups};
use crate::retry::download_with_retry;
use crate::types::{BundleReport, Event, FetchOutcome, GroupReport};

/// Where a manifest comes from
#[derive(Clone, Debug)]
pub enum ManifestSource {
    /// A local JSON file
    File(PathBuf),
    /// `{server}/assets/{bundle}/config.{version_hash}.json`
    Remote {
        /// Bundle name
        bundle: String,
        /// Version hash of the bundle config
        version_hash: String,
    },
    /// An already parsed manifest
    Parsed(Manifest),
}

impl ManifestSource {
    /// Short human-readable label, used when the bundle name is not known yet
    pub fn label(&self) -> String {
        match self {
            ManifestSource::File(path) => path.display().to_string(),
            ManifestSource::Remote {
                bundle,
                version_hash,
            } => format!("{bundle}:{version_hash}"),
            ManifestSource::Parsed(manifest) => manifest.name.clone(),
        }
    }
}

/// Outcome of one manifest of a batch run
#[derive(Debug)]
pub struct BatchOutcome {
    /// Source label of the manifest
    pub source: String,
    /// Report, or the error that stopped this manifest
    pub result: Result<BundleReport>,
}

/// Downloads the assets of bundle manifests into per-bundle zip archives
pub struct BundleDownloader {
    config: Arc<Config>,
    fetcher: Arc<dyn AssetFetcher>,
    engine: DownloadEngine,
    event_tx: broadcast::Sender<Event>,
}

impl BundleDownloader {
    /// Create a downloader fetching over HTTP
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.download)?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create a downloader with a custom fetcher
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn AssetFetcher>) -> Result<Self> {
        config.validate()?;

        let engine = DownloadEngine::new(EngineSettings::from_config(&config), fetcher.clone());
        let (event_tx, _rx) = broadcast::channel(1000);

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            engine,
            event_tx,
        })
    }

    /// Subscribe to processing events
    ///
    /// Events emitted before subscribing are not replayed. A slow receiver
    /// may observe `RecvError::Lagged` and miss progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn emit_event(&self, event: Event) {
        // send() only fails without receivers
        self.event_tx.send(event).ok();
    }

    /// Download every asset of `manifest` from `server` and write its archive
    ///
    /// Skipped groups are reported and ignored. If no asset was found in any
    /// group, no archive is written and [`Error::EmptyResultSet`] is returned.
    pub async fn process_manifest(
        &self,
        manifest: &Manifest,
        server: &ServerBase,
    ) -> Result<BundleReport> {
        let bundle = manifest.name.clone();
        info!(
            bundle = %bundle,
            identifiers = manifest.identifiers.len(),
            server = %server,
            "Processing bundle"
        );
        self.emit_event(Event::BundleStarted {
            bundle: bundle.clone(),
            identifiers: manifest.identifiers.len(),
        });

        let mut assembler = ArchiveAssembler::new();
        let mut groups = Vec::new();

        let resolved = resolve_groups(manifest, server, &self.config.download.extensions)?;
        for group in resolved {
            let (kind, tasks) = match group {
                ResolvedGroup::Tasks { kind, tasks } => (kind, tasks),
                ResolvedGroup::Skipped { kind, reason } => {
                    self.emit_event(Event::GroupSkipped {
                        bundle: bundle.clone(),
                        group: kind,
                        reason: reason.to_string(),
                    });
                    continue;
                }
            };

            let task_count = tasks.len();
            self.emit_event(Event::GroupStarted {
                bundle: bundle.clone(),
                group: kind,
                tasks: task_count,
            });

            let results = self
                .engine
                .download(tasks, |progress: &Progress| {
                    self.emit_event(Event::Progress {
                        processed: progress.processed,
                        total: progress.total,
                        found: progress.found,
                        missing: progress.missing,
                        percent: progress.percent(),
                        items_per_second: progress.items_per_second,
                    });
                })
                .await;

            let found = assembler.add_results(results);
            let report = GroupReport {
                tasks: task_count,
                found,
                not_found: task_count - found,
            };
            info!(
                bundle = %bundle,
                group = %kind,
                found = report.found,
                not_found = report.not_found,
                "Group complete"
            );
            self.emit_event(Event::GroupComplete {
                bundle: bundle.clone(),
                group: kind,
                found: report.found,
                not_found: report.not_found,
            });
            groups.push((kind, report));
        }

        if assembler.is_empty() {
            warn!(
                bundle = %bundle,
                "No files were found; the manifest may use an unsupported format"
            );
            self.emit_event(Event::EmptyResultSet {
                bundle: bundle.clone(),
            });
            return Err(Error::EmptyResultSet { bundle });
        }

        let files = assembler.len();
        let output_dir = self.config.output.output_dir.clone();
        let archive_bundle = bundle.clone();
        let archive_path =
            tokio::task::spawn_blocking(move || assembler.flush(&output_dir, &archive_bundle))
                .await
                .map_err(|e| Error::Other(format!("archive writer task failed: {e}")))??;

        info!(bundle = %bundle, files, path = %archive_path.display(), "Total files included: {}", files);
        self.emit_event(Event::ArchiveWritten {
            bundle: bundle.clone(),
            path: archive_path.clone(),
            files,
        });

        Ok(BundleReport {
            bundle,
            groups,
            archive_path,
        })
    }

    /// Load a manifest file and process it
    pub async fn process_manifest_file(
        &self,
        path: &Path,
        server: &ServerBase,
    ) -> Result<BundleReport> {
        let manifest = Manifest::from_path(path)?;
        self.process_manifest(&manifest, server).await
    }

    /// Fetch a bundle config from the server
    ///
    /// A 404 is reported as [`ManifestError::NotFound`]; transient failures are
    /// retried per the retry policy.
    pub async fn fetch_remote_manifest(
        &self,
        server: &ServerBase,
        bundle: &str,
        version_hash: &str,
    ) -> Result<Manifest> {
        let url = server.bundle_config_url(bundle, version_hash);
        let timeout = self.config.download.task_timeout;
        info!(url = %url, "Fetching bundle manifest");

        let outcome = download_with_retry(&self.config.retry, || {
            let fetcher = &self.fetcher;
            let url = &url;
            async move {
                tokio::time::timeout(timeout, fetcher.fetch(url))
                    .await
                    .unwrap_or(Err(FetchError::Timeout(timeout)))
            }
        })
        .await?;

        match outcome {
            FetchOutcome::Found(body) => Manifest::from_slice(&body),
            FetchOutcome::NotFound => Err(ManifestError::NotFound { url }.into()),
        }
    }

    /// Resolve a source into a manifest
    pub async fn load_manifest(
        &self,
        source: &ManifestSource,
        server: &ServerBase,
    ) -> Result<Manifest> {
        match source {
            ManifestSource::File(path) => Manifest::from_path(path),
            ManifestSource::Remote {
                bundle,
                version_hash,
            } => self.fetch_remote_manifest(server, bundle, version_hash).await,
            ManifestSource::Parsed(manifest) => Ok(manifest.clone()),
        }
    }

    /// Process several manifests one after another
    ///
    /// Best-effort: a failing manifest is logged and reported, and the run
    /// continues with the next one.
    pub async fn process_manifests(
        &self,
        sources: &[ManifestSource],
        server: &ServerBase,
    ) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(sources.len());

        for source in sources {
            let label = source.label();
            let result = match self.load_manifest(source, server).await {
                Ok(manifest) => self.process_manifest(&manifest, server).await,
                Err(e) => Err(e),
            };

            if let Err(e) = &result {
                if e.is_recoverable() {
                    warn!(source = %label, error = %e, code = e.error_code(), "Bundle failed, continuing");
                } else {
                    error!(source = %label, error = %e, code = e.error_code(), "Bundle failed, continuing");
                }
                self.emit_event(Event::BundleFailed {
                    bundle: label.clone(),
                    error: e.to_string(),
                });
            }

            outcomes.push(BatchOutcome {
                source: label,
                result,
            });
        }

        outcomes
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GroupKind;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Serves fixed payloads by URL suffix; everything else is a 404
    struct MapFetcher {
        files: HashMap<String, Vec<u8>>,
        requested: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn new(files: &[(&str, &[u8])]) -> Arc<Self> {
            Arc::new(Self {
                files: files
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_vec()))
                    .collect(),
                requested: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl AssetFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<FetchOutcome, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            let hit = self
                .files
                .iter()
                .find(|(suffix, _)| url.ends_with(suffix.as_str()));
            Ok(match hit {
                Some((_, body)) => FetchOutcome::Found(body.clone()),
                None => FetchOutcome::NotFound,
            })
        }
    }

    fn config(output_dir: &Path) -> Config {
        let mut config = Config::default();
        config.download.extensions = vec![".json".into(), ".png".into()];
        config.download.task_timeout = Duration::from_secs(5);
        config.retry.initial_delay = Duration::from_millis(10);
        config.output.output_dir = output_dir.to_path_buf();
        config
    }

    fn manifest() -> Manifest {
        Manifest::from_json_str(
            r#"{
                "name": "main",
                "importBase": "import",
                "nativeBase": "native",
                "uuids": ["fcmR3XADNLgJ1ByKhqcC5Z", "0e95a9f8d"],
                "versions": {"import": [0, "5d3f2"], "native": [1, "0b9c1"]}
            }"#,
        )
        .unwrap()
    }

    fn server() -> ServerBase {
        ServerBase::parse("http://cdn.test").unwrap()
    }

    #[tokio::test]
    async fn writes_archive_with_found_assets_and_reports_groups() {
        let dir = TempDir::new().unwrap();
        let fetcher = MapFetcher::new(&[
            (
                "/assets/main/import/fc/fc991dd7-0033-4b80-9d41-c8a86a702e59.5d3f2.json",
                b"{\"scene\":1}",
            ),
            ("/assets/main/native/0e/0e95a9f8d.0b9c1.png", b"PNG"),
        ]);
        let downloader = BundleDownloader::with_fetcher(config(dir.path()), fetcher.clone()).unwrap();

        let report = downloader.process_manifest(&manifest(), &server()).await.unwrap();

        assert_eq!(report.bundle, "main");
        assert_eq!(report.archive_path, dir.path().join("main-bundle.zip"));
        assert_eq!(report.tasks(), 4);
        assert_eq!(report.found(), 2);
        assert_eq!(report.not_found(), 2);
        assert_eq!(
            report.groups.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
            vec![GroupKind::Import, GroupKind::Native]
        );
        assert_eq!(fetcher.requested.lock().unwrap().len(), 4);

        let file = std::fs::File::open(&report.archive_path).unwrap();
        let archive = zip::ZipArchive::new(file).unwrap();
        let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "main/import/fc/fc991dd7-0033-4b80-9d41-c8a86a702e59.5d3f2.json",
                "main/native/0e/0e95a9f8d.0b9c1.png",
            ]
        );
    }

    #[tokio::test]
    async fn empty_result_set_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let downloader =
            BundleDownloader::with_fetcher(config(dir.path()), MapFetcher::new(&[])).unwrap();
        let mut events = downloader.subscribe();

        let err = downloader
            .process_manifest(&manifest(), &server())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::EmptyResultSet { ref bundle } if bundle == "main"));
        assert!(err.is_recoverable());
        assert!(!dir.path().join("main-bundle.zip").exists());

        let mut saw_empty = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, Event::EmptyResultSet { .. }) {
                saw_empty = true;
            }
            assert!(!matches!(event, Event::ArchiveWritten { .. }));
        }
        assert!(saw_empty);
    }

    #[tokio::test]
    async fn bad_index_in_any_group_aborts_before_downloading() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest::from_json_str(
            r#"{"name":"main","importBase":"import","nativeBase":"native","uuids":["0e95a9f8d"],
                "versions":{"import":[0,"aa"],"native":[4,"bb"]}}"#,
        )
        .unwrap();
        let fetcher = MapFetcher::new(&[("/assets/main/import/0e/0e95a9f8d.aa.json", b"{}")]);
        let downloader = BundleDownloader::with_fetcher(config(dir.path()), fetcher.clone()).unwrap();

        let err = downloader
            .process_manifest(&manifest, &server())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Manifest(ManifestError::IdentifierIndexOutOfRange { index: 4, .. })
        ));
        assert!(fetcher.requested.lock().unwrap().is_empty());
        assert!(!dir.path().join("main-bundle.zip").exists());
    }

    #[tokio::test]
    async fn skipped_group_is_reported_and_others_processed() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest::from_json_str(
            r#"{"name":"res","importBase":"import","uuids":["0e95a9f8d"],
                "versions":{"import":[0,"aa"],"native":[0,"bb"]}}"#,
        )
        .unwrap();
        let fetcher = MapFetcher::new(&[("/assets/res/import/0e/0e95a9f8d.aa.json", b"{}")]);
        let downloader = BundleDownloader::with_fetcher(config(dir.path()), fetcher).unwrap();
        let mut events = downloader.subscribe();

        let report = downloader.process_manifest(&manifest, &server()).await.unwrap();

        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].0, GroupKind::Import);
        let mut skipped = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let Event::GroupSkipped { group, .. } = event {
                skipped.push(group);
            }
        }
        assert_eq!(skipped, vec![GroupKind::Native]);
    }

    #[tokio::test]
    async fn progress_events_reach_subscribers() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(dir.path());
        cfg.download.sub_batch_size = 1;
        let fetcher = MapFetcher::new(&[("0e95a9f8d.0b9c1.png", b"PNG")]);
        let downloader = BundleDownloader::with_fetcher(cfg, fetcher).unwrap();
        let mut events = downloader.subscribe();

        downloader.process_manifest(&manifest(), &server()).await.unwrap();

        let mut progress = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let Event::Progress {
                processed, total, ..
            } = event
            {
                progress.push((processed, total));
            }
        }
        // two groups of two tasks, one event per task
        assert_eq!(progress, vec![(1, 2), (2, 2), (1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn batch_run_continues_after_failures() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"name":"broken"}"#).unwrap();
        let fetcher = MapFetcher::new(&[("0e95a9f8d.0b9c1.png", b"PNG")]);
        let downloader = BundleDownloader::with_fetcher(config(dir.path()), fetcher).unwrap();

        let outcomes = downloader
            .process_manifests(
                &[
                    ManifestSource::File(bad.clone()),
                    ManifestSource::File(dir.path().join("absent.json")),
                    ManifestSource::Parsed(manifest()),
                ],
                &server(),
            )
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(matches!(
            outcomes[0].result,
            Err(Error::Manifest(ManifestError::MissingField("uuids")))
        ));
        assert!(matches!(outcomes[1].result, Err(Error::Io(_))));
        let report = outcomes[2].result.as_ref().unwrap();
        assert_eq!(report.found(), 1);
        assert_eq!(outcomes[2].source, "main");
    }

    #[tokio::test]
    async fn remote_manifest_404_is_manifest_not_found() {
        let dir = TempDir::new().unwrap();
        let downloader =
            BundleDownloader::with_fetcher(config(dir.path()), MapFetcher::new(&[])).unwrap();

        let err = downloader
            .fetch_remote_manifest(&server(), "main", "abc12")
            .await
            .unwrap_err();

        match err {
            Error::Manifest(ManifestError::NotFound { url }) => {
                assert_eq!(url, "http://cdn.test/assets/main/config.abc12.json");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn remote_manifest_is_parsed() {
        let dir = TempDir::new().unwrap();
        let fetcher = MapFetcher::new(&[(
            "/assets/main/config.abc12.json",
            br#"{"name":"main","uuids":[],"versions":{}}"#,
        )]);
        let downloader = BundleDownloader::with_fetcher(config(dir.path()), fetcher).unwrap();

        let manifest = downloader
            .fetch_remote_manifest(&server(), "main", "abc12")
            .await
            .unwrap();

        assert_eq!(manifest.name, "main");
        assert!(manifest.identifiers.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = Config::default();
        cfg.download.concurrency_limit = 0;

        let result = BundleDownloader::with_fetcher(cfg, MapFetcher::new(&[]));

        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
