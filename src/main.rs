//! Command-line wrapper around [`bundle_dl::BundleDownloader`].

use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use bundle_dl::{BundleDownloader, Config, Event, ManifestSource, ServerBase};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Rebuild asset bundles from their manifests into `{bundle}-bundle.zip` archives.
#[derive(Debug, Parser)]
#[command(name = "bundle-dl")]
#[command(about = "Rebuild remote asset bundles from compact manifests", long_about = None)]
struct Cli {
    /// Server base URL, e.g. https://example.com/game/v1/
    server: String,

    /// Local bundle manifest files (config.XXXX.json)
    manifests: Vec<PathBuf>,

    /// Fetch a manifest from `{server}/assets/BUNDLE/config.HASH.json` (repeatable)
    #[arg(long = "remote", value_name = "BUNDLE:HASH")]
    remote: Vec<RemoteManifest>,

    /// JSON configuration file loaded before the flags below are applied
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum concurrent requests
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Requests per progress update
    #[arg(long, value_name = "N")]
    sub_batch: Option<usize>,

    /// Per-request timeout
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Delay before retrying a failed request
    #[arg(long, value_name = "SECS")]
    retry_delay_secs: Option<u64>,

    /// Give up on a request after N retries (default: retry forever)
    #[arg(long, value_name = "N")]
    max_attempts: Option<u32>,

    /// Directory the archives are written to
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
}

#[derive(Clone, Debug)]
struct RemoteManifest {
    bundle: String,
    version_hash: String,
}

impl FromStr for RemoteManifest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((bundle, hash)) if !bundle.is_empty() && !hash.is_empty() => Ok(Self {
                bundle: bundle.to_string(),
                version_hash: hash.to_string(),
            }),
            _ => Err(format!("expected BUNDLE:HASH, got '{s}'")),
        }
    }
}

impl Cli {
    fn build_config(&self) -> bundle_dl::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)?,
            None => Config::default(),
        };

        if let Some(n) = self.concurrency {
            config.download.concurrency_limit = n;
        }
        if let Some(n) = self.sub_batch {
            config.download.sub_batch_size = n;
        }
        if let Some(secs) = self.timeout_secs {
            config.download.task_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.retry_delay_secs {
            config.retry.initial_delay = Duration::from_secs(secs);
        }
        if self.max_attempts.is_some() {
            config.retry.max_attempts = self.max_attempts;
        }
        if let Some(dir) = &self.output_dir {
            config.output.output_dir = dir.clone();
        }

        config.validate()?;
        Ok(config)
    }

    fn sources(&self) -> Vec<ManifestSource> {
        self.manifests
            .iter()
            .cloned()
            .map(ManifestSource::File)
            .chain(self.remote.iter().map(|r| ManifestSource::Remote {
                bundle: r.bundle.clone(),
                version_hash: r.version_hash.clone(),
            }))
            .collect()
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bundle_dl=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Render progress events as a single rewritten line on stdout
fn spawn_progress_printer(
    mut events: tokio::sync::broadcast::Receiver<Event>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;

        loop {
            match events.recv().await {
                Ok(Event::Progress {
                    processed,
                    total,
                    percent,
                    ..
                }) => {
                    let mut stdout = std::io::stdout().lock();
                    write!(stdout, "\r> Progress: {processed}/{total} ({}%)", percent.round()).ok();
                    stdout.flush().ok();
                }
                Ok(Event::GroupComplete { .. }) => println!(),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    if cli.manifests.is_empty() && cli.remote.is_empty() {
        eprintln!("bundle-dl error: no manifest given (pass manifest files or --remote BUNDLE:HASH)");
        std::process::exit(1);
    }

    let setup = cli.build_config().and_then(|config| {
        let server = ServerBase::parse(&cli.server)?;
        Ok((BundleDownloader::new(config)?, server))
    });
    let (downloader, server) = match setup {
        Ok(setup) => setup,
        Err(err) => {
            eprintln!("bundle-dl error: {err}");
            std::process::exit(1);
        }
    };

    tracing::info!(server = %server, "Target server");
    let printer = spawn_progress_printer(downloader.subscribe());
    let outcomes = downloader.process_manifests(&cli.sources(), &server).await;
    drop(downloader);
    printer.await.ok();

    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => println!(
                "Bundle created: {} ({} files included)",
                report.archive_path.display(),
                report.found()
            ),
            Err(err) => println!("Bundle {} skipped: {err}", outcome.source),
        }
    }
}
