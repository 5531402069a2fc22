//! Configuration types for bundle-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File extensions probed for every version entry when none are configured
pub const DEFAULT_FILE_EXTENSIONS: &[&str] = &[
    ".json", ".ttf", ".bin", ".png", ".jpg", ".bmp", ".jpeg", ".gif", ".ico", ".tiff", ".webp",
    ".image", ".pvr", ".pkm", ".mp3", ".ogg", ".wav", ".m4a",
];

/// Download behavior configuration (concurrency, batching, timeouts, probed extensions)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Maximum number of fetches in flight at once (default: 400)
    ///
    /// Tasks are processed in outer chunks of this size; the next chunk only
    /// starts once every task of the current one has finished.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Size of the sub-batches an outer chunk is split into (default: 50)
    ///
    /// Sub-batches run concurrently and only control how often progress is reported.
    #[serde(default = "default_sub_batch_size")]
    pub sub_batch_size: usize,

    /// Per-attempt timeout for a single fetch (default: 30 seconds)
    #[serde(default = "default_task_timeout", with = "duration_serde")]
    pub task_timeout: Duration,

    /// Extensions probed for every version entry, in order
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Optional User-Agent header for asset requests (None = client default)
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            sub_batch_size: default_sub_batch_size(),
            task_timeout: default_task_timeout(),
            extensions: default_extensions(),
            user_agent: None,
        }
    }
}

/// Retry behavior for transient fetch failures
///
/// The defaults retry forever with a fixed 5 second pause. Setting
/// `max_attempts` or a `backoff_multiplier` above 1.0 turns this into a
/// bounded exponential backoff.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt (default: None = unbounded)
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Delay before the first retry (default: 5 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after every retry (default: 1.0 = fixed)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Where finished archives are written
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving `{bundle}-bundle.zip` files (default: ".")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

/// Top-level configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Archive output
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings that would make a run impossible
    pub fn validate(&self) -> Result<()> {
        if self.download.concurrency_limit == 0 {
            return Err(Error::Config {
                message: "concurrency limit must be at least 1".into(),
                key: Some("concurrency_limit".into()),
            });
        }
        if self.download.sub_batch_size == 0 {
            return Err(Error::Config {
                message: "sub-batch size must be at least 1".into(),
                key: Some("sub_batch_size".into()),
            });
        }
        if self.download.task_timeout.is_zero() {
            return Err(Error::Config {
                message: "task timeout must be greater than zero".into(),
                key: Some("task_timeout".into()),
            });
        }
        if self.download.extensions.is_empty() {
            return Err(Error::Config {
                message: "at least one file extension must be probed".into(),
                key: Some("extensions".into()),
            });
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: format!(
                    "backoff multiplier must be >= 1.0, got {}",
                    self.retry.backoff_multiplier
                ),
                key: Some("backoff_multiplier".into()),
            });
        }
        Ok(())
    }
}

fn default_concurrency_limit() -> usize {
    400
}

fn default_sub_batch_size() -> usize {
    50
}

fn default_task_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_extensions() -> Vec<String> {
    DEFAULT_FILE_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
