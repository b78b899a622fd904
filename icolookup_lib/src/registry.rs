//! Rate-limited, retrying registry search.
//!
//! Wraps [`rpo_api::Client`] with the shared [`RateLimiter`] and the retry
//! policy, and reduces raw records to [`ApiCandidate`]s.

use std::future::Future;
use std::sync::Arc;

use rpo_api::SearchQuery;

use crate::cancel::CancelFlag;
use crate::config::LookupConfig;
use crate::error::{ConfigError, RegistryError};
use crate::identifier::candidate_from_record;
use crate::model::ApiCandidate;
use crate::rate_limiter::{RateLimiter, RequestStats};
use crate::retry::{with_retry, RetryPolicy};

/// Candidates for one query variant plus the retries it took to get them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    /// In registry order; the registry's ranking is kept.
    pub candidates: Vec<ApiCandidate>,
    pub retries: u32,
}

/// Anything that can turn a search string into candidates.
///
/// Implemented by [`RegistryClient`]; tests plug in scripted fakes.
pub trait CandidateSearch: Send + Sync {
    fn search(
        &self,
        query: &str,
        cancel: &CancelFlag,
    ) -> impl Future<Output = Result<SearchOutcome, RegistryError>> + Send;

    /// Request counters, if the implementation keeps any.
    fn request_stats(&self) -> RequestStats {
        RequestStats::default()
    }
}

/// Registry search client shared by all workers.
pub struct RegistryClient {
    inner: rpo_api::Client,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    only_active: bool,
}

impl RegistryClient {
    pub fn new(
        inner: rpo_api::Client,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        only_active: bool,
    ) -> Self {
        Self {
            inner,
            limiter,
            policy,
            only_active,
        }
    }

    /// Builds the HTTP client, limiter and retry policy from a config.
    pub fn from_config(config: &LookupConfig) -> Result<Self, ConfigError> {
        url::Url::parse(&config.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url '{}': {}", config.base_url, e)))?;
        let inner = rpo_api::Client::with_timeout(&config.base_url, config.timeout())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let limiter = Arc::new(RateLimiter::new(config.max_requests, config.window()));
        Ok(Self::new(
            inner,
            limiter,
            config.retry_policy(),
            config.only_active,
        ))
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

impl CandidateSearch for RegistryClient {
    async fn search(&self, query: &str, cancel: &CancelFlag) -> Result<SearchOutcome, RegistryError> {
        let request = SearchQuery::new(query).with_only_active(self.only_active);
        let label = format!("search '{}'", query);

        let retried = with_retry(&self.limiter, &self.policy, cancel, &label, || {
            self.inner.search(&request)
        })
        .await?;

        let total = retried.value.len();
        let candidates: Vec<ApiCandidate> =
            retried.value.iter().filter_map(candidate_from_record).collect();
        if candidates.len() < total {
            tracing::debug!(
                "{}: dropped {} record(s) without identifier or name",
                label,
                total - candidates.len()
            );
        }
        tracing::debug!("{}: {} candidate(s)", label, candidates.len());

        Ok(SearchOutcome {
            candidates,
            retries: retried.retries,
        })
    }

    fn request_stats(&self) -> RequestStats {
        self.limiter.tracker().stats()
    }
}
