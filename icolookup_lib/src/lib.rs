//! Library layer for icolookup: name normalization, rate-limited registry
//! search, match selection and the concurrent batch coordinator.
//!
//! Wraps the `rpo_api` crate with a sliding-window rate limiter and retries,
//! and turns a list of company names into one identifier result per name.

pub mod cancel;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod identifier;
pub mod input_spec;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod rate_limiter;
pub mod registry;
pub mod retry;
pub mod summary;

pub use rpo_api;

pub use cancel::CancelFlag;
pub use config::LookupConfig;
pub use coordinator::{BatchProgress, LookupCoordinator, ProgressSink, RowProgress};
pub use error::{ConfigError, RegistryError};
pub use identifier::{is_valid_ico, normalize_identifier};
pub use input_spec::{resolve_input_spec, ColumnStats, InputChoice, InputSpec, InputSpecError};
pub use matcher::{MatchSelector, RowStatus};
pub use model::{ApiCandidate, CompanyQuery, IdentifierType, LookupResult, MatchStrategy};
pub use normalize::NameNormalizer;
pub use rate_limiter::{RateLimiter, RequestStats};
pub use registry::{CandidateSearch, RegistryClient, SearchOutcome};
pub use retry::RetryPolicy;
pub use summary::RunSummary;
