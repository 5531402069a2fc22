//! Progress accounting for batched runs.
//!
//! Counters only move when a whole sub-batch completes, so every reported
//! snapshot is monotonic.

use std::time::Instant;

use crate::retry::Attempted;
use crate::types::{DownloadResult, FetchOutcome};

/// Classifies a finished task as a hit (something was retrieved) or a miss
pub trait TaskOutcome {
    /// Whether the task produced a payload
    fn is_hit(&self) -> bool;
}

impl TaskOutcome for FetchOutcome {
    fn is_hit(&self) -> bool {
        self.is_found()
    }
}

impl TaskOutcome for DownloadResult {
    fn is_hit(&self) -> bool {
        self.is_found()
    }
}

impl<R: TaskOutcome, E> TaskOutcome for Attempted<R, E> {
    fn is_hit(&self) -> bool {
        self.result.as_ref().is_ok_and(TaskOutcome::is_hit)
    }
}

/// Snapshot handed to the progress callback after each sub-batch
#[derive(Clone, Debug, PartialEq)]
pub struct Progress {
    /// Tasks finished so far
    pub processed: usize,
    /// Total tasks in the run
    pub total: usize,
    /// Hits so far
    pub found: usize,
    /// Misses so far
    pub missing: usize,
    /// Tasks per second since the previous snapshot
    pub items_per_second: f64,
}

impl Progress {
    /// Completion percentage, 0.0 to 100.0 (100.0 for an empty run)
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            100.0
        } else {
            (self.processed as f32 / self.total as f32) * 100.0
        }
    }
}

/// Running counters behind [`Progress`]
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    total: usize,
    processed: usize,
    found: usize,
    missing: usize,
    last_update: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            found: 0,
            missing: 0,
            last_update: Instant::now(),
        }
    }

    /// Fold a completed sub-batch into the counters and snapshot them
    pub(crate) fn record<R: TaskOutcome>(&mut self, sub_batch: &[R]) -> Progress {
        let hits = sub_batch.iter().filter(|r| r.is_hit()).count();
        self.found += hits;
        self.missing += sub_batch.len() - hits;
        self.processed += sub_batch.len();

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.last_update = now;
        let items_per_second = if elapsed > 0.0 {
            sub_batch.len() as f64 / elapsed
        } else {
            0.0
        };

        Progress {
            processed: self.processed,
            total: self.total,
            found: self.found,
            missing: self.missing,
            items_per_second,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_sub_batch() {
        let mut tracker = ProgressTracker::new(5);

        let first = tracker.record(&[FetchOutcome::Found(vec![1]), FetchOutcome::NotFound]);
        let second = tracker.record(&[
            FetchOutcome::NotFound,
            FetchOutcome::NotFound,
            FetchOutcome::Found(vec![]),
        ]);

        assert_eq!((first.processed, first.found, first.missing), (2, 1, 1));
        assert_eq!((second.processed, second.found, second.missing), (5, 2, 3));
        assert_eq!(second.percent(), 100.0);
    }

    #[test]
    fn percent_of_partial_run() {
        let progress = Progress {
            processed: 50,
            total: 200,
            found: 0,
            missing: 50,
            items_per_second: 0.0,
        };

        assert_eq!(progress.percent(), 25.0);
    }

    #[test]
    fn empty_run_is_complete() {
        let progress = Progress {
            processed: 0,
            total: 0,
            found: 0,
            missing: 0,
            items_per_second: 0.0,
        };

        assert_eq!(progress.percent(), 100.0);
    }

    #[test]
    fn failed_attempt_is_a_miss() {
        let failed: Attempted<FetchOutcome, &str> = Attempted {
            result: Err("gave up"),
            attempts: 3,
        };
        let found: Attempted<FetchOutcome, &str> = Attempted {
            result: Ok(FetchOutcome::Found(vec![0])),
            attempts: 1,
        };

        assert!(!failed.is_hit());
        assert!(found.is_hit());
    }

    #[test]
    fn throughput_is_non_negative() {
        let mut tracker = ProgressTracker::new(2);
        std::thread::sleep(std::time::Duration::from_millis(5));

        let progress = tracker.record(&[FetchOutcome::NotFound, FetchOutcome::NotFound]);

        assert!(progress.items_per_second > 0.0);
        assert!(progress.items_per_second.is_finite());
    }
}
