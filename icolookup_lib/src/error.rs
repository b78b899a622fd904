//! Error types for the library layer.

use std::path::PathBuf;

use thiserror::Error;

/// Why a single registry search produced no candidate list.
///
/// Rate limiting never shows up here: the limiter resolves it by waiting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Every allowed attempt hit a transient failure (network, timeout, 5xx, 429).
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
    /// The registry rejected the request in a way retrying cannot fix.
    #[error("request rejected: {message}")]
    Permanent { attempts: u32, message: String },
    /// The run was cancelled before or between attempts.
    #[error("cancelled")]
    Cancelled { attempts: u32 },
}

impl RegistryError {
    /// Requests actually sent before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::Permanent { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
        }
    }
}

/// Configuration problems. These are the only fatal errors: they are raised
/// before any lookup starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("environment variable {key} has invalid value '{value}'")]
    InvalidEnv { key: String, value: String },
    #[error("invalid legal suffix pattern: {0}")]
    InvalidSuffix(#[from] regex::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
