//! Batched task execution under a global concurrency ceiling.
//!
//! Tasks are cut into outer chunks of `concurrency_limit`; each chunk is cut
//! into sub-batches of `sub_batch_size`. All sub-batches of a chunk run
//! concurrently, every member of a sub-batch runs concurrently, and the next
//! chunk only starts once the current one has fully finished. Peak in-flight
//! fetches therefore never exceed `concurrency_limit`; sub-batching only sets
//! the progress reporting grain.
//!
//! Everything runs on the calling task: concurrent fetches interleave at
//! network and timer suspension points.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;

use crate::config::{Config, RetryConfig};
use crate::error::FetchError;
use crate::retry::{Attempted, retry_counted};
use crate::types::{DownloadResult, DownloadTask, FetchOutcome};

use super::fetcher::AssetFetcher;
use super::progress::{Progress, ProgressTracker, TaskOutcome};

/// Batching, timeout and retry knobs of the engine
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Outer chunk size and in-flight ceiling
    pub concurrency_limit: usize,
    /// Sub-batch size (progress grain)
    pub sub_batch_size: usize,
    /// Per-attempt timeout
    pub task_timeout: Duration,
    /// Retry policy for transient failures
    pub retry: RetryConfig,
}

impl EngineSettings {
    /// Take the relevant parts of a [`Config`]
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency_limit: config.download.concurrency_limit,
            sub_batch_size: config.download.sub_batch_size,
            task_timeout: config.download.task_timeout,
            retry: config.retry.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Executes task lists with bounded concurrency, per-task timeout and retry
pub struct DownloadEngine {
    settings: EngineSettings,
    fetcher: Arc<dyn AssetFetcher>,
}

impl DownloadEngine {
    /// Create an engine fetching through `fetcher`
    pub fn new(settings: EngineSettings, fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self { settings, fetcher }
    }

    /// Run arbitrary tasks through `fetch_one`
    ///
    /// Each attempt is raced against the task timeout; timeouts and other
    /// [`FetchError`]s are retried per the retry policy. `on_progress` is called
    /// once per finished sub-batch. Results come back in input order.
    pub async fn run<T, R, F, Fut, P>(
        &self,
        tasks: Vec<T>,
        fetch_one: F,
        on_progress: P,
    ) -> Vec<Attempted<R, FetchError>>
    where
        T: Clone,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, FetchError>>,
        R: TaskOutcome,
        P: FnMut(&Progress),
    {
        let total = tasks.len();
        let chunk_size = self.settings.concurrency_limit.max(1);
        let sub_batch_size = self.settings.sub_batch_size.max(1);
        let state = Mutex::new((ProgressTracker::new(total), on_progress));
        let mut results = Vec::with_capacity(total);

        tracing::info!(
            total,
            concurrency_limit = chunk_size,
            sub_batch_size,
            "Starting batch processing"
        );

        for (chunk_index, chunk) in tasks.chunks(chunk_size).enumerate() {
            tracing::debug!(chunk = chunk_index, size = chunk.len(), "Dispatching chunk");

            let sub_batches = chunk.chunks(sub_batch_size).map(|sub_batch| {
                let fetch_one = &fetch_one;
                let state = &state;
                async move {
                    let outcomes = join_all(
                        sub_batch
                            .iter()
                            .cloned()
                            .map(|task| self.run_one(task, fetch_one)),
                    )
                    .await;

                    let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
                    let (tracker, on_progress) = &mut *guard;
                    let progress = tracker.record(&outcomes);
                    on_progress(&progress);

                    outcomes
                }
            });

            for outcomes in join_all(sub_batches).await {
                results.extend(outcomes);
            }
        }

        results
    }

    /// One task: timeout per attempt, retry per policy
    async fn run_one<T, R, F, Fut>(&self, task: T, fetch_one: &F) -> Attempted<R, FetchError>
    where
        T: Clone,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, FetchError>>,
    {
        let timeout = self.settings.task_timeout;
        retry_counted(&self.settings.retry, || {
            let attempt = fetch_one(task.clone());
            async move {
                match tokio::time::timeout(timeout, attempt).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout(timeout)),
                }
            }
        })
        .await
    }

    /// Fetch every task through the engine's [`AssetFetcher`]
    ///
    /// Returns one [`DownloadResult`] per task, in input order. A 404 is a
    /// `NotFound` result after a single attempt. With the default (unbounded)
    /// retry policy no result ever carries an error.
    pub async fn download<P>(&self, tasks: Vec<DownloadTask>, on_progress: P) -> Vec<DownloadResult>
    where
        P: FnMut(&Progress),
    {
        let paths: Vec<String> = tasks.iter().map(|t| t.archive_path.clone()).collect();
        let fetcher = &self.fetcher;

        let outcomes = self
            .run(
                tasks,
                |task: DownloadTask| async move {
                    let outcome = fetcher.fetch(&task.remote_url).await;
                    match &outcome {
                        Ok(FetchOutcome::NotFound) => {
                            tracing::debug!(url = %task.remote_url, "Not found");
                        }
                        Err(e) => {
                            tracing::warn!(url = %task.remote_url, error = %e, "Error downloading");
                        }
                        Ok(FetchOutcome::Found(_)) => {}
                    }
                    outcome
                },
                on_progress,
            )
            .await;

        paths
            .into_iter()
            .zip(outcomes)
            .map(|(archive_path, attempted)| match attempted.result {
                Ok(outcome) => DownloadResult {
                    archive_path,
                    outcome,
                    attempts: attempted.attempts,
                    error: None,
                },
                Err(e) => {
                    tracing::error!(
                        path = %archive_path,
                        attempts = attempted.attempts,
                        error = %e,
                        "Giving up on task"
                    );
                    DownloadResult {
                        archive_path,
                        outcome: FetchOutcome::NotFound,
                        attempts: attempted.attempts,
                        error: Some(e),
                    }
                }
            })
            .collect()
    }
}
