//! Error types for the API client.

/// Errors that can occur when making API requests.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request never produced a response (connection refused, reset, DNS).
    #[error("Request failed: {0}")]
    RequestFailed(String),
    /// The request did not complete within the client timeout.
    #[error("Request timed out")]
    Timeout,
    /// The API returned a non-success status with a body snippet.
    #[error("Request failed with status {status}")]
    HttpStatus { status: u16, body: String },
    /// The body was not the JSON shape we expect.
    #[error("Failed to parse response: {0}")]
    ParseFailed(String),
    /// The configured base URL could not be joined with the search path.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// Whether repeating the same request may succeed.
    ///
    /// Transport failures, timeouts, 5xx and 429 are transient. Any other
    /// status, a malformed body or a bad URL will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(_) | Self::Timeout => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Self::ParseFailed(_) | Self::InvalidUrl(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> Error {
        Error::HttpStatus {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn server_errors_are_transient() {
        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(Error::Timeout.is_transient());
        assert!(Error::RequestFailed("connection reset".into()).is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        assert!(!status(400).is_transient());
        assert!(!status(403).is_transient());
        assert!(!Error::ParseFailed("eof".into()).is_transient());
        assert!(!Error::InvalidUrl("nope".into()).is_transient());
    }
}
