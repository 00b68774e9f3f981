use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::{backoff, DeqmError, Headers, Resource, Result};

/// One response received while polling an asynchronous operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: String,
}

impl PollResponse {
    pub fn new(status: u16, headers: Headers, body: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// `202 Accepted` or `429 Too Many Requests`: the operation is not done yet.
    pub fn is_in_progress(&self) -> bool {
        matches!(self.status, 202 | 429)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_location(&self) -> Option<&str> {
        self.headers.get("content-location")
    }

    /// Positive `Retry-After` delay, if the server sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        backoff::retry_after(&self.headers)
    }

    /// Deserializes the body into any serde type.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|err| {
            DeqmError::Decode(format!(
                "invalid JSON body (status {}): {err}",
                self.status
            ))
        })
    }

    /// Decodes the body as one of the supported FHIR resources.
    pub fn resource(&self) -> Result<Resource> {
        Resource::from_json(&self.body)
    }
}

/// How a poll loop ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// A status other than 202/429 was received.
    Completed {
        response: PollResponse,
        attempts: u32,
        elapsed: Duration,
    },
    /// The budget ran out while the server still reported progress.
    TimedOut {
        last: PollResponse,
        attempts: u32,
        elapsed: Duration,
    },
}

impl PollOutcome {
    /// Final response, whether terminal or the last in-progress one.
    pub fn response(&self) -> &PollResponse {
        match self {
            Self::Completed { response, .. } => response,
            Self::TimedOut { last, .. } => last,
        }
    }

    pub fn into_response(self) -> PollResponse {
        match self {
            Self::Completed { response, .. } => response,
            Self::TimedOut { last, .. } => last,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Completed { attempts, .. } | Self::TimedOut { attempts, .. } => *attempts,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Completed { elapsed, .. } | Self::TimedOut { elapsed, .. } => *elapsed,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Treats a timeout as [`DeqmError::PollTimeout`].
    ///
    /// Terminal responses are returned as-is, including 4xx/5xx ones.
    pub fn into_result(self) -> Result<PollResponse> {
        match self {
            Self::Completed { response, .. } => Ok(response),
            Self::TimedOut {
                last,
                attempts,
                elapsed,
            } => Err(DeqmError::PollTimeout {
                elapsed,
                attempts,
                last_status: last.status,
            }),
        }
    }
}
