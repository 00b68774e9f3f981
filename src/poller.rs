use std::fmt;
use std::time::Duration;

use reqwest::{header, Url};
use tokio::time::sleep;

use crate::{
    backoff::BackoffState, DeqmError, Headers, PollOptions, PollOutcome, PollResponse, Result,
};

pub(crate) const FHIR_JSON: &str = "application/fhir+json";

/// Polls the status endpoint of an asynchronous FHIR operation.
///
/// Only `202` and `429` are retried. Any other status ends the loop and is
/// handed back untouched; transport failures are returned immediately.
#[derive(Clone)]
pub struct AsyncOperationPoller {
    http: reqwest::Client,
    authorization: Option<String>,
    request_timeout: Duration,
}

impl fmt::Debug for AsyncOperationPoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncOperationPoller")
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "<redacted>"),
            )
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl AsyncOperationPoller {
    pub fn new(http: reqwest::Client, request_timeout: Duration) -> Self {
        Self {
            http,
            authorization: None,
            request_timeout,
        }
    }

    /// Sends `value` as the `Authorization` header on every poll request.
    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    /// Polls `location` until a terminal status or until `timeout` has elapsed.
    ///
    /// Waits start at `initial_wait` and double unless the server sends a
    /// positive `Retry-After`.
    pub async fn poll(
        &self,
        location: &str,
        timeout: Duration,
        initial_wait: Duration,
    ) -> Result<PollOutcome> {
        self.poll_with(location, &PollOptions::new(timeout, initial_wait))
            .await
    }

    pub async fn poll_with(&self, location: &str, options: &PollOptions) -> Result<PollOutcome> {
        options.validate()?;
        let url = Url::parse(location)
            .map_err(|err| DeqmError::InvalidUrl(format!("{location}: {err}")))?;

        let mut state = BackoffState::new(options);
        loop {
            let response = self.fetch(url.clone()).await?;
            state.record_attempt();

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt = state.attempts(),
                status = response.status,
                %url,
                "polled async operation"
            );

            if !response.is_in_progress() {
                return Ok(PollOutcome::Completed {
                    response,
                    attempts: state.attempts(),
                    elapsed: state.elapsed(),
                });
            }

            let elapsed = state.elapsed();
            if elapsed > options.timeout {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    attempts = state.attempts(),
                    last_status = response.status,
                    "async operation still in progress after {:?}",
                    elapsed
                );

                return Ok(PollOutcome::TimedOut {
                    last: response,
                    attempts: state.attempts(),
                    elapsed,
                });
            }

            // Final poll lands on the deadline even when Retry-After points past it.
            let wait = state
                .next_wait(&response)
                .min(options.timeout.saturating_sub(elapsed));

            #[cfg(feature = "tracing")]
            tracing::debug!("retrying async status request after {} ms", wait.as_millis());

            sleep(wait).await;
        }
    }

    async fn fetch(&self, url: Url) -> Result<PollResponse> {
        let mut request = self
            .http
            .get(url)
            .header(header::ACCEPT, FHIR_JSON)
            .timeout(self.request_timeout);
        if let Some(authorization) = &self.authorization {
            request = request.header(header::AUTHORIZATION, authorization);
        }

        let response = request.send().await.map_err(DeqmError::Transport)?;
        let status = response.status().as_u16();
        let headers = Headers::from(response.headers());
        let body = response.text().await.map_err(DeqmError::Transport)?;
        Ok(PollResponse::new(status, headers, body))
    }
}
