//! Run statistics.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tokio::time::Instant;

use crate::matcher::RowStatus;
use crate::rate_limiter::RequestStats;

/// Counters and timing for one lookup run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub attempted: u64,
    pub succeeded: u64,
    pub not_found: u64,
    pub failed_permanently: u64,
    pub failed_after_retry: u64,
    pub cancelled: u64,
    /// HTTP requests sent, retries included.
    pub requests_made: u64,
    /// Requests that ended in an error, retried ones included.
    pub failed_requests: u64,
    pub retries: u64,
    /// Retry sleeps summed over all workers.
    #[serde(rename = "backoff_secs", serialize_with = "duration_as_secs")]
    pub backoff: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(rename = "duration_secs", serialize_with = "duration_as_secs")]
    pub duration: Duration,
}

impl RunSummary {
    /// Share of attempted rows that got an identifier, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.attempted as f64 * 100.0
    }

    pub fn avg_secs_per_row(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.duration.as_secs_f64() / self.attempted as f64
    }

    pub fn rows_per_minute(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.attempted as f64 * 60.0 / secs
    }
}

fn duration_as_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64((d.as_secs_f64() * 1000.0).round() / 1000.0)
}

#[derive(Debug, Default)]
struct Counters {
    attempted: u64,
    succeeded: u64,
    not_found: u64,
    failed_permanently: u64,
    failed_after_retry: u64,
    cancelled: u64,
    retries: u64,
}

/// Mutable summary shared by the workers of a run.
#[derive(Debug)]
pub struct SummaryAccumulator {
    counters: Mutex<Counters>,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl SummaryAccumulator {
    pub fn start() -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn record(&self, status: RowStatus, retries: u32) {
        let mut c = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        c.attempted += 1;
        c.retries += u64::from(retries);
        match status {
            RowStatus::Matched => c.succeeded += 1,
            RowStatus::NotFound => c.not_found += 1,
            RowStatus::FailedPermanently => c.failed_permanently += 1,
            RowStatus::FailedAfterRetry => c.failed_after_retry += 1,
            RowStatus::Cancelled => c.cancelled += 1,
        }
    }

    /// Freezes the counters into a [`RunSummary`].
    pub fn finish(&self, requests: RequestStats) -> RunSummary {
        let c = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        RunSummary {
            attempted: c.attempted,
            succeeded: c.succeeded,
            not_found: c.not_found,
            failed_permanently: c.failed_permanently,
            failed_after_retry: c.failed_after_retry,
            cancelled: c.cancelled,
            requests_made: requests.requests_made,
            failed_requests: requests.requests_failed,
            retries: c.retries,
            backoff: requests.backoff,
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration: self.started.elapsed(),
        }
    }
}
