use std::fmt;
use std::time::Duration;

use reqwest::{header, StatusCode, Url};
use serde::Serialize;

use crate::{
    poller::FHIR_JSON, AsyncOperationPoller, ClientOptions, DeqmError, Headers, PollOutcome,
    Result,
};

/// Relative path of the bulk `$import` kickoff endpoint.
pub const BULK_IMPORT_PATH: &str = "$import";
/// Relative path of the DEQM bulk `$submit-data` kickoff endpoint.
pub const BULK_SUBMIT_DATA_PATH: &str = "Measure/$bulk-submit-data";

#[derive(Clone)]
/// HTTP client for the asynchronous operations of a DEQM FHIR server.
pub struct DeqmClient {
    http: reqwest::Client,
    base_url: String,
    authorization: Option<String>,
    options: ClientOptions,
}

impl fmt::Debug for DeqmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeqmClient")
            .field("base_url", &self.base_url)
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "<redacted>"),
            )
            .field("options", &self.options)
            .finish()
    }
}

impl DeqmClient {
    /// Creates a client for an unauthenticated server.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            authorization: None,
            options: ClientOptions::default(),
        }
    }

    /// Creates a client with a full raw authorization value.
    ///
    /// Example: `"Bearer <token>"` or any custom scheme.
    pub fn new_raw_auth(base_url: impl Into<String>, authorization: impl Into<String>) -> Self {
        Self {
            authorization: Some(authorization.into()),
            ..Self::new(base_url)
        }
    }

    /// Creates a client from a bearer token.
    ///
    /// If the token is missing the `Bearer ` prefix, it is added automatically.
    pub fn new_bearer(base_url: impl Into<String>, token: impl AsRef<str>) -> Self {
        let authorization = normalize_bearer_authorization(token.as_ref());
        Self::new_raw_auth(base_url, authorization)
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `DEQM_SERVER_URL` — FHIR base URL (e.g. `https://fhir.example.org/r4`)
    /// - `DEQM_TOKEN` — optional access token (Bearer prefix optional)
    ///
    /// Poll settings come from [`crate::PollOptions::from_env`].
    pub fn from_env() -> std::result::Result<Self, String> {
        let url = std::env::var("DEQM_SERVER_URL")
            .map_err(|_| "missing DEQM_SERVER_URL environment variable".to_owned())?;
        if url.trim().is_empty() {
            return Err("DEQM_SERVER_URL is set but empty".to_owned());
        }

        let client = match std::env::var("DEQM_TOKEN") {
            Ok(token) if !token.trim().is_empty() => Self::new_bearer(url.trim(), token),
            _ => Self::new(url.trim()),
        };
        let options = ClientOptions {
            poll: crate::PollOptions::from_env()?,
            ..ClientOptions::default()
        };
        Ok(client.with_options(options))
    }

    /// Applies client options such as request timeout and poll budget.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins the base URL and `path` with exactly one `/`.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// A poller sharing this client's connection pool and authorization.
    pub fn poller(&self) -> AsyncOperationPoller {
        let poller = AsyncOperationPoller::new(
            self.http.clone(),
            Duration::from_millis(self.options.timeout_ms),
        );
        match &self.authorization {
            Some(authorization) => poller.with_authorization(authorization.clone()),
            None => poller,
        }
    }

    /// Starts an asynchronous operation with a GET kickoff request.
    ///
    /// Returns the absolute polling URL from `Content-Location`.
    pub async fn start_get(&self, path: &str) -> Result<String> {
        let request = self.http.get(self.endpoint_url(path));
        self.kickoff(request).await
    }

    /// Starts an asynchronous operation with a POST kickoff request.
    pub async fn start_post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<String> {
        let payload = serde_json::to_vec(body)
            .map_err(|err| DeqmError::Decode(format!("could not encode request body: {err}")))?;
        let request = self
            .http
            .post(self.endpoint_url(path))
            .header(header::CONTENT_TYPE, FHIR_JSON)
            .body(payload);
        self.kickoff(request).await
    }

    /// Kicks off a bulk `$import` and returns the polling URL.
    pub async fn bulk_import<B: Serialize + ?Sized>(&self, body: &B) -> Result<String> {
        self.start_post(BULK_IMPORT_PATH, body).await
    }

    /// Kicks off `Measure/$bulk-submit-data` and returns the polling URL.
    pub async fn bulk_submit_data<B: Serialize + ?Sized>(&self, body: &B) -> Result<String> {
        self.start_post(BULK_SUBMIT_DATA_PATH, body).await
    }

    /// Polls `location` with the configured poll options.
    pub async fn poll(&self, location: &str) -> Result<PollOutcome> {
        self.poller().poll_with(location, &self.options.poll).await
    }

    /// POST kickoff followed by polling to completion or timeout.
    pub async fn run_post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<PollOutcome> {
        let location = self.start_post(path, body).await?;
        self.poll(&location).await
    }

    async fn kickoff(&self, request: reqwest::RequestBuilder) -> Result<String> {
        let mut request = request
            .header(header::ACCEPT, FHIR_JSON)
            .header("Prefer", "respond-async")
            .timeout(Duration::from_millis(self.options.timeout_ms));
        if let Some(authorization) = &self.authorization {
            request = request.header(header::AUTHORIZATION, authorization);
        }

        let response = request.send().await.map_err(DeqmError::Transport)?;
        let status = response.status();
        let request_url = response.url().clone();
        let headers = Headers::from(response.headers());
        let body = response.text().await.map_err(DeqmError::Transport)?;

        if status != StatusCode::ACCEPTED {
            return Err(DeqmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let location = headers
            .get("content-location")
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(DeqmError::MissingContentLocation {
                status: status.as_u16(),
            })?;
        let location = resolve_location(&request_url, location)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(%location, "async operation accepted");

        Ok(location)
    }
}

fn resolve_location(request_url: &Url, location: &str) -> Result<String> {
    request_url
        .join(location)
        .map(String::from)
        .map_err(|err| DeqmError::InvalidUrl(format!("{location}: {err}")))
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Url;

    use super::{normalize_bearer_authorization, resolve_location, DeqmClient};

    #[test]
    fn normalize_bearer_adds_prefix_when_missing() {
        assert_eq!(
            normalize_bearer_authorization("abc123"),
            "Bearer abc123".to_owned()
        );
    }

    #[test]
    fn normalize_bearer_keeps_existing_prefix() {
        assert_eq!(
            normalize_bearer_authorization("bEaReR abc123"),
            "bEaReR abc123".to_owned()
        );
    }

    #[test]
    fn debug_redacts_authorization_value() {
        let client = DeqmClient::new_raw_auth("https://fhir.example.org", "secret-token");
        let debug = format!("{client:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn endpoint_url_joins_with_single_slash() {
        let client = DeqmClient::new("https://fhir.example.org/r4/");
        assert_eq!(
            client.endpoint_url("/Measure/$bulk-submit-data"),
            "https://fhir.example.org/r4/Measure/$bulk-submit-data"
        );
        assert_eq!(
            DeqmClient::new("https://fhir.example.org/r4").endpoint_url("$import"),
            "https://fhir.example.org/r4/$import"
        );
    }

    #[test]
    fn relative_location_resolves_against_request_url() {
        let request = Url::parse("http://127.0.0.1:8080/r4/$import").expect("valid url");
        assert_eq!(
            resolve_location(&request, "/status/7").expect("must resolve"),
            "http://127.0.0.1:8080/status/7"
        );
        assert_eq!(
            resolve_location(&request, "https://other.example/poll/1").expect("must resolve"),
            "https://other.example/poll/1"
        );
    }
}
