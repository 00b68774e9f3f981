use std::time::Duration;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum DeqmError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Unexpected HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Server accepted an async request but gave no polling location.
    #[error("async kickoff returned {status} without a content-location header")]
    MissingContentLocation { status: u16 },
    /// URL that could not be parsed or resolved.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// Poll options rejected before any request was sent.
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    /// Response decoding or resource-shape validation error.
    #[error("decode error: {0}")]
    Decode(String),
    /// Poll budget exhausted while the server still reported progress.
    #[error("polling timed out after {elapsed:?} ({attempts} attempts, last status {last_status})")]
    PollTimeout {
        elapsed: Duration,
        attempts: u32,
        last_status: u16,
    },
}
