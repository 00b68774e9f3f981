use std::time::Duration;

use crate::{DeqmError, Result};

/// Configures HTTP timeout and polling behavior of [`crate::DeqmClient`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Polling behavior for asynchronous operations.
    pub poll: PollOptions,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            poll: PollOptions::default(),
        }
    }
}

/// Wait and budget settings for one poll loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollOptions {
    /// Wait before the second request when the server sends no `Retry-After`.
    pub initial_wait: Duration,
    /// Wall-clock budget measured from the first poll request.
    pub timeout: Duration,
    /// Upper bound for computed (doubled) waits. Never applied to `Retry-After`.
    pub max_wait: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_secs(1),
            timeout: Duration::from_secs(120),
            max_wait: None,
        }
    }
}

impl PollOptions {
    pub fn new(timeout: Duration, initial_wait: Duration) -> Self {
        Self {
            initial_wait,
            timeout,
            max_wait: None,
        }
    }

    /// Caps computed backoff at `max_wait`.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Reads poll options from the environment, falling back to defaults.
    ///
    /// Reads (all optional, whole seconds):
    /// - `DEQM_POLL_INITIAL_WAIT_SECS`
    /// - `DEQM_POLL_TIMEOUT_SECS`
    /// - `DEQM_POLL_MAX_WAIT_SECS`
    pub fn from_env() -> std::result::Result<Self, String> {
        let mut options = Self::default();
        if let Some(secs) = env_secs("DEQM_POLL_INITIAL_WAIT_SECS")? {
            options.initial_wait = secs;
        }
        if let Some(secs) = env_secs("DEQM_POLL_TIMEOUT_SECS")? {
            options.timeout = secs;
        }
        options.max_wait = env_secs("DEQM_POLL_MAX_WAIT_SECS")?;
        options.validate().map_err(|err| err.to_string())?;
        Ok(options)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.initial_wait.is_zero() {
            return Err(DeqmError::InvalidOptions(
                "initial wait must be greater than zero".to_owned(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(DeqmError::InvalidOptions(
                "poll timeout must be greater than zero".to_owned(),
            ));
        }
        if self.max_wait.is_some_and(|max| max.is_zero()) {
            return Err(DeqmError::InvalidOptions(
                "max wait must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

fn env_secs(name: &str) -> std::result::Result<Option<Duration>, String> {
    match std::env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| format!("{name} must be a whole number of seconds, got '{raw}'")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ClientOptions, PollOptions};
    use crate::DeqmError;

    #[test]
    fn defaults_match_bulk_call_sites() {
        let options = ClientOptions::default();
        assert_eq!(options.poll.initial_wait, Duration::from_secs(1));
        assert_eq!(options.poll.timeout, Duration::from_secs(120));
        assert_eq!(options.poll.max_wait, None);
    }

    #[test]
    fn zero_initial_wait_is_rejected() {
        let options = PollOptions::new(Duration::from_secs(10), Duration::ZERO);
        assert!(matches!(
            options.validate(),
            Err(DeqmError::InvalidOptions(_))
        ));
    }

    #[test]
    fn zero_cap_is_rejected() {
        let options = PollOptions::default().with_max_wait(Duration::ZERO);
        assert!(options.validate().is_err());
    }

    #[test]
    fn positive_options_are_accepted() {
        let options = PollOptions::new(Duration::from_millis(50), Duration::from_millis(5))
            .with_max_wait(Duration::from_millis(20));
        assert!(options.validate().is_ok());
    }
}
