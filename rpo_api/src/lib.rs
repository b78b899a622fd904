//! Typed HTTP client for the RPO (Register of Legal Entities) search endpoint.
//!
//! One call is one request: pacing and retries live in the layer above.

mod client;
mod errors;
mod query;
pub mod types;
pub use self::client::{Client, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use self::errors::Error;
pub use self::query::SearchQuery;
