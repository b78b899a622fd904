//! Run configuration: worker pool, rate limit, retry policy and suffix list.
//!
//! Values come from built-in defaults, optionally overlaid by a TOML file and
//! then by `ICOLOOKUP_*` environment variables. The result is validated once,
//! before any work starts.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::normalize::{NameNormalizer, DEFAULT_LEGAL_SUFFIXES};
use crate::retry::RetryPolicy;

/// Upper bound on the worker pool; beyond this the rate limit is the only bottleneck anyway.
pub const MAX_WORKERS: usize = 256;

/// Separator for `ICOLOOKUP_LEGAL_SUFFIXES` (patterns may contain `|` and `,`).
const SUFFIX_ENV_SEPARATOR: char = ';';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LookupConfig {
    /// Concurrent lookup workers.
    pub workers: usize,
    /// Requests allowed per sliding window.
    pub max_requests: u64,
    pub window_secs: u64,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Attempts per search, including the first.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub max_jitter_ms: u64,
    /// Rows per batch; only affects memory and progress reporting.
    pub batch_size: usize,
    pub only_active: bool,
    pub base_url: String,
    /// Legal-form patterns (regex fragments) stripped from the end of names.
    pub legal_suffixes: Vec<String>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            workers: 6,
            max_requests: 60,
            window_secs: 60,
            timeout_secs: 12,
            max_attempts: 3,
            backoff_base_ms: 1000,
            max_jitter_ms: 250,
            batch_size: 60,
            only_active: true,
            base_url: rpo_api::DEFAULT_BASE_URL.to_string(),
            legal_suffixes: DEFAULT_LEGAL_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl LookupConfig {
    /// Parses a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads and parses a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Applies `ICOLOOKUP_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any key lookup. Unset keys are left alone; set
    /// keys that fail to parse are an error rather than silently ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(&lookup, "ICOLOOKUP_WORKERS", &mut self.workers)?;
        override_parsed(&lookup, "ICOLOOKUP_MAX_REQUESTS", &mut self.max_requests)?;
        override_parsed(&lookup, "ICOLOOKUP_WINDOW_SECS", &mut self.window_secs)?;
        override_parsed(&lookup, "ICOLOOKUP_TIMEOUT_SECS", &mut self.timeout_secs)?;
        override_parsed(&lookup, "ICOLOOKUP_MAX_ATTEMPTS", &mut self.max_attempts)?;
        override_parsed(&lookup, "ICOLOOKUP_BACKOFF_BASE_MS", &mut self.backoff_base_ms)?;
        override_parsed(&lookup, "ICOLOOKUP_MAX_JITTER_MS", &mut self.max_jitter_ms)?;
        override_parsed(&lookup, "ICOLOOKUP_BATCH_SIZE", &mut self.batch_size)?;
        override_parsed(&lookup, "ICOLOOKUP_ONLY_ACTIVE", &mut self.only_active)?;
        if let Some(url) = lookup("ICOLOOKUP_BASE_URL") {
            self.base_url = url.trim().to_string();
        }
        if let Some(list) = lookup("ICOLOOKUP_LEGAL_SUFFIXES") {
            self.legal_suffixes = list
                .split(SUFFIX_ENV_SEPARATOR)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(self)
    }

    /// Rejects settings that would make the run misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "workers must be between 1 and {}, got {}",
                MAX_WORKERS, self.workers
            )));
        }
        if self.max_requests == 0 {
            return Err(ConfigError::Invalid("max_requests must be at least 1".into()));
        }
        if self.window_secs == 0 {
            return Err(ConfigError::Invalid("window_secs must be at least 1".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url '{}': {}", self.base_url, e)))?;
        self.normalizer()?;
        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_jitter: Duration::from_millis(self.max_jitter_ms),
        }
    }

    /// Compiles the configured suffix list.
    pub fn normalizer(&self) -> Result<NameNormalizer, ConfigError> {
        Ok(NameNormalizer::new(&self.legal_suffixes)?)
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(key) {
        *target = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            key: key.to_string(),
            value: raw.clone(),
        })?;
    }
    Ok(())
}
