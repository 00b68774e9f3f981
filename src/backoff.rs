use std::time::Duration;

use tokio::time::Instant;

use crate::{Headers, PollOptions, PollResponse};

/// Parses `Retry-After` as a positive number of seconds.
///
/// HTTP-date values, zero and anything non-numeric yield `None`.
pub fn retry_after(headers: &Headers) -> Option<Duration> {
    let secs = headers.get("retry-after")?.trim().parse::<u64>().ok()?;
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Next wait after `previous`: the server's `Retry-After` when present,
/// otherwise `previous` doubled.
pub fn retry_or_backoff(previous: Duration, response: &PollResponse) -> Duration {
    retry_after(&response.headers).unwrap_or_else(|| previous.saturating_mul(2))
}

/// Per-loop wait and clock bookkeeping.
#[derive(Debug)]
pub(crate) struct BackoffState {
    initial_wait: Duration,
    max_wait: Option<Duration>,
    previous: Option<Duration>,
    started: Instant,
    attempts: u32,
}

impl BackoffState {
    pub(crate) fn new(options: &PollOptions) -> Self {
        Self {
            initial_wait: options.initial_wait,
            max_wait: options.max_wait,
            previous: None,
            started: Instant::now(),
            attempts: 0,
        }
    }

    pub(crate) fn record_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Computes and remembers the wait that follows `response`.
    pub(crate) fn next_wait(&mut self, response: &PollResponse) -> Duration {
        let wait = match (response.retry_after(), self.previous) {
            (Some(server), _) => server,
            (None, None) => self.cap(self.initial_wait),
            (None, Some(previous)) => self.cap(retry_or_backoff(previous, response)),
        };
        self.previous = Some(wait);
        wait
    }

    fn cap(&self, wait: Duration) -> Duration {
        match self.max_wait {
            Some(max) => wait.min(max),
            None => wait,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{retry_after, retry_or_backoff, BackoffState};
    use crate::{Headers, PollOptions, PollResponse};

    fn in_progress(retry_after: Option<&str>) -> PollResponse {
        let headers: Headers = retry_after
            .map(|value| ("Retry-After", value))
            .into_iter()
            .collect();
        PollResponse::new(202, headers, "")
    }

    #[test]
    fn doubles_without_retry_after() {
        for secs in [1, 2, 3, 7, 60, 3600] {
            let previous = Duration::from_secs(secs);
            assert_eq!(
                retry_or_backoff(previous, &in_progress(None)),
                previous * 2
            );
        }
        assert_eq!(
            retry_or_backoff(Duration::from_millis(15), &in_progress(None)),
            Duration::from_millis(30)
        );
    }

    #[test]
    fn server_override_wins_regardless_of_previous() {
        for previous in [1, 8, 500] {
            assert_eq!(
                retry_or_backoff(Duration::from_secs(previous), &in_progress(Some("5"))),
                Duration::from_secs(5)
            );
        }
    }

    #[test]
    fn unusable_retry_after_falls_back_to_doubling() {
        for value in ["0", "-3", "soon", "", "Wed, 21 Oct 2015 07:28:00 GMT", "1.5"] {
            assert_eq!(
                retry_or_backoff(Duration::from_secs(4), &in_progress(Some(value))),
                Duration::from_secs(8),
                "value {value:?}"
            );
        }
    }

    #[test]
    fn lowercase_retry_after_is_honored() {
        let headers: Headers = [("retry-after", "5")].into_iter().collect();
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(5)));

        let response = PollResponse::new(429, headers, "");
        assert_eq!(
            retry_or_backoff(Duration::from_secs(1), &response),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn retry_after_tolerates_surrounding_whitespace() {
        let headers: Headers = [("Retry-After", " 12 ")].into_iter().collect();
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(12)));
    }

    #[test]
    fn doubling_saturates_instead_of_overflowing() {
        assert_eq!(
            retry_or_backoff(Duration::MAX, &in_progress(None)),
            Duration::MAX
        );
    }

    #[tokio::test]
    async fn state_starts_at_initial_wait_then_doubles() {
        let options = PollOptions::new(Duration::from_secs(120), Duration::from_secs(1));
        let mut state = BackoffState::new(&options);
        let waits: Vec<_> = (0..4)
            .map(|_| state.next_wait(&in_progress(None)))
            .collect();
        assert_eq!(
            waits,
            [1, 2, 4, 8].map(Duration::from_secs).to_vec()
        );
    }

    #[tokio::test]
    async fn state_doubles_from_last_server_wait() {
        let options = PollOptions::new(Duration::from_secs(120), Duration::from_secs(1));
        let mut state = BackoffState::new(&options);
        assert_eq!(
            state.next_wait(&in_progress(Some("3"))),
            Duration::from_secs(3)
        );
        assert_eq!(state.next_wait(&in_progress(None)), Duration::from_secs(6));
    }

    #[tokio::test]
    async fn cap_limits_computed_waits_only() {
        let options = PollOptions::new(Duration::from_secs(600), Duration::from_secs(4))
            .with_max_wait(Duration::from_secs(10));
        let mut state = BackoffState::new(&options);
        assert_eq!(state.next_wait(&in_progress(None)), Duration::from_secs(4));
        assert_eq!(state.next_wait(&in_progress(None)), Duration::from_secs(8));
        assert_eq!(state.next_wait(&in_progress(None)), Duration::from_secs(10));
        assert_eq!(
            state.next_wait(&in_progress(Some("30"))),
            Duration::from_secs(30)
        );
    }

    #[tokio::test]
    async fn attempts_are_counted() {
        let mut state = BackoffState::new(&PollOptions::default());
        state.record_attempt();
        state.record_attempt();
        assert_eq!(state.attempts(), 2);
    }
}
