//! Sliding-window rate limiter shared by all lookup workers.
//!
//! The registry tolerates roughly one request per second; the default budget
//! is 60 requests per rolling 60-second window. Grants are recorded as
//! timestamps, and a caller that finds the window full sleeps until the oldest
//! grant ages out.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Default requests per window.
pub const DEFAULT_MAX_REQUESTS: u64 = 60;

/// Default sliding window duration.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window rate limiter.
///
/// Tracks timestamps of recent grants in a `VecDeque` behind a tokio Mutex.
/// Callers line up on a second (fair, FIFO) mutex for the whole duration of
/// `acquire()`, so the caller that has waited longest is admitted first.
/// Permits are consumed, never returned.
pub struct RateLimiter {
    timestamps: Mutex<VecDeque<Instant>>,
    queue: Mutex<()>,
    max_requests: u64,
    window_duration: Duration,
    tracker: RequestTracker,
}

impl RateLimiter {
    /// Create a rate limiter with explicit budget and window.
    pub fn new(max_requests: u64, window_duration: Duration) -> Self {
        Self {
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests.min(4096) as usize)),
            queue: Mutex::new(()),
            max_requests: max_requests.max(1),
            window_duration,
            tracker: RequestTracker::new(),
        }
    }

    /// Wait until a request slot is available, then record the timestamp.
    ///
    /// If the sliding window is full, computes how long until the oldest
    /// entry expires, drops the window lock, sleeps, then re-checks.
    pub async fn acquire(&self) {
        let _turn = self.queue.lock().await;
        loop {
            let now = Instant::now();
            let mut ts = self.timestamps.lock().await;

            // Evict grants that are at least one full window old
            while ts
                .front()
                .is_some_and(|&t| now.duration_since(t) >= self.window_duration)
            {
                ts.pop_front();
            }

            if (ts.len() as u64) < self.max_requests {
                ts.push_back(now);
                return;
            }

            let wait = match ts.front() {
                Some(&oldest) => (oldest + self.window_duration).saturating_duration_since(now),
                None => Duration::ZERO,
            };

            // Drop lock before sleeping
            drop(ts);
            tracing::debug!("Rate limit window full, waiting {:.1}s", wait.as_secs_f64());
            sleep(wait).await;
        }
    }

    /// Access the request tracker for recording outcomes.
    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    /// The configured max requests per window.
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window_duration
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

/// Request counters for one limiter, read into the run summary.
pub struct RequestTracker {
    requests_made: AtomicU64,
    requests_failed: AtomicU64,
    backoff_ms: AtomicU64,
}

impl RequestTracker {
    fn new() -> Self {
        Self {
            requests_made: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            backoff_ms: AtomicU64::new(0),
        }
    }

    pub fn record_success(&self) {
        self.requests_made.fetch_add(1, Ordering::Relaxed);
    }

    /// An attempt that ended in an error, whether or not it gets retried.
    pub fn record_failure(&self) {
        self.requests_made.fetch_add(1, Ordering::Relaxed);
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backoff(&self, duration: Duration) {
        self.backoff_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn stats(&self) -> RequestStats {
        RequestStats {
            requests_made: self.requests_made.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            backoff: Duration::from_millis(self.backoff_ms.load(Ordering::Relaxed)),
        }
    }
}

/// Snapshot of [`RequestTracker`] counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestStats {
    /// HTTP requests sent, retries included.
    pub requests_made: u64,
    pub requests_failed: u64,
    /// Time spent sleeping between retries, summed over all workers.
    pub backoff: Duration,
}

impl RequestStats {
    /// Counters accumulated since an earlier snapshot.
    pub fn since(&self, earlier: &RequestStats) -> RequestStats {
        RequestStats {
            requests_made: self.requests_made.saturating_sub(earlier.requests_made),
            requests_failed: self.requests_failed.saturating_sub(earlier.requests_failed),
            backoff: self.backoff.saturating_sub(earlier.backoff),
        }
    }
}
