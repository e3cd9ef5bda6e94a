//! Readiness polling
//!
//! Bounded retry with a fixed (linear) delay, used to tolerate asynchronous
//! container startup. Any received HTTP response counts as ready; status codes
//! are left to the content assertions that follow. A timeout is reported as a
//! distinct [`PollOutcome::TimedOut`] so it is never mistaken for wrong content.

use crate::errors::{PollError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Retry budget for one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Total number of attempts, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(1),
        }
    }
}

impl PollConfig {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Time spent sleeping between attempts that all fail at once
    pub fn max_wait(&self) -> Duration {
        self.delay * self.max_attempts.saturating_sub(1)
    }
}

/// Result of a readiness poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollOutcome<T = String> {
    /// A response arrived on attempt `attempts`
    Ready { body: T, attempts: u32 },
    /// Every attempt failed
    TimedOut { attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Ready { attempts, .. } | Self::TimedOut { attempts } => *attempts,
        }
    }

    /// The response body, or a timeout error naming `target`
    pub fn into_body(self, target: &str) -> Result<T> {
        match self {
            Self::Ready { body, .. } => Ok(body),
            Self::TimedOut { attempts } => Err(PollError::TimedOut {
                url: target.to_string(),
                attempts,
            }
            .into()),
        }
    }
}

/// Retry `probe` until it yields a value or the budget runs out
///
/// Exactly `max_attempts` probes are made for a target that never becomes
/// ready. Attempt `n` must finish by `n × delay` after the start, and the next
/// attempt begins at that mark, so the whole poll ends within
/// `max_attempts × delay` even when a probe hangs. A zero delay disables the
/// per-attempt deadline.
pub async fn poll_until<T, F, Fut>(config: &PollConfig, mut probe: F) -> PollOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = Instant::now();
    for attempt in 1..=config.max_attempts {
        let slot_end = start + config.delay * attempt;
        let result = if config.delay.is_zero() {
            probe(attempt).await
        } else {
            match tokio::time::timeout_at(slot_end, probe(attempt)).await {
                Ok(result) => result,
                Err(_) => {
                    debug!("Attempt {} exceeded its {:?} slot", attempt, config.delay);
                    None
                }
            }
        };
        if let Some(value) = result {
            debug!("Ready after {} attempt(s)", attempt);
            return PollOutcome::Ready {
                body: value,
                attempts: attempt,
            };
        }
        if attempt < config.max_attempts {
            tokio::time::sleep_until(slot_end).await;
        }
    }
    PollOutcome::TimedOut {
        attempts: config.max_attempts,
    }
}

/// HTTP GET abstraction used by the poller
#[async_trait]
pub trait HttpProbe: Send + Sync {
    /// Fetch `url`, returning the body of any response received
    async fn get(&self, url: &str) -> std::result::Result<String, String>;
}

/// reqwest-backed probe
#[derive(Debug, Clone)]
pub struct ReqwestProbe {
    client: reqwest::Client,
}

impl ReqwestProbe {
    /// Create a probe with a per-request timeout
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PollError::Request {
                url: String::new(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn get(&self, url: &str) -> std::result::Result<String, String> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                format!("Request timeout for URL: {}", url)
            } else {
                e.to_string()
            }
        })?;
        debug!("{} -> {}", url, response.status());
        response.text().await.map_err(|e| e.to_string())
    }
}

/// Join a base URL and a request path
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// GET `base_url` + `path` until any response arrives
#[instrument(skip(probe, config), fields(attempts = config.max_attempts))]
pub async fn poll_http(
    probe: &dyn HttpProbe,
    base_url: &str,
    path: &str,
    config: &PollConfig,
) -> PollOutcome {
    let url = join_url(base_url, path);
    let outcome = poll_until(config, |attempt| {
        let url = url.clone();
        async move {
            match probe.get(&url).await {
                Ok(body) => Some(body),
                Err(e) => {
                    debug!("Attempt {} for {} failed: {}", attempt, url, e);
                    None
                }
            }
        }
    })
    .await;
    if !outcome.is_ready() {
        warn!("{} did not respond after {} attempts", url, config.max_attempts);
    }
    outcome
}

pub mod mock {
    //! Scripted HTTP probe for tests

    use super::HttpProbe;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    #[derive(Debug, Default)]
    struct MockProbeState {
        bodies: HashMap<String, String>,
        failures_before_ready: u32,
        requests: Vec<String>,
    }

    /// Probe answering from a URL → body table
    #[derive(Debug, Default)]
    pub struct MockProbe {
        state: Mutex<MockProbeState>,
    }

    impl MockProbe {
        pub fn new() -> Self {
            Self::default()
        }

        fn state(&self) -> MutexGuard<'_, MockProbeState> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Serve `body` at `url`
        pub fn respond(&self, url: &str, body: &str) {
            self.state()
                .bodies
                .insert(url.to_string(), body.to_string());
        }

        /// Fail the next `count` requests regardless of URL
        pub fn fail_first(&self, count: u32) {
            self.state().failures_before_ready = count;
        }

        pub fn requests(&self) -> Vec<String> {
            self.state().requests.clone()
        }
    }

    #[async_trait]
    impl HttpProbe for MockProbe {
        async fn get(&self, url: &str) -> std::result::Result<String, String> {
            let mut state = self.state();
            state.requests.push(url.to_string());
            if state.failures_before_ready > 0 {
                state.failures_before_ready -= 1;
                return Err("connection refused".to_string());
            }
            state
                .bodies
                .get(url)
                .cloned()
                .ok_or_else(|| "connection refused".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockProbe;
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://h:1", "/"), "http://h:1/");
        assert_eq!(join_url("http://h:1/", "/TextFile.txt"), "http://h:1/TextFile.txt");
        assert_eq!(join_url("http://h:1", "a/b"), "http://h:1/a/b");
    }

    #[test]
    fn test_max_wait_is_linear() {
        let config = PollConfig::new(5, Duration::from_millis(200));
        assert_eq!(config.max_wait(), Duration::from_millis(800));
        assert_eq!(PollConfig::new(0, Duration::from_secs(1)).max_wait(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_ready_makes_exactly_max_attempts() {
        let calls = AtomicU32::new(0);
        let config = PollConfig::new(7, Duration::from_secs(1));
        let start = tokio::time::Instant::now();

        let outcome: PollOutcome<()> = poll_until(&config, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { None }
        })
        .await;

        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 7 });
        assert_eq!(calls.load(Ordering::SeqCst), 7);
        assert!(start.elapsed() <= config.max_attempts * config.delay);
        assert_eq!(start.elapsed(), config.max_wait());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_stays_within_budget() {
        let calls = AtomicU32::new(0);
        let config = PollConfig::new(4, Duration::from_millis(250));
        let start = tokio::time::Instant::now();

        let outcome: PollOutcome<()> = poll_until(&config, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                None
            }
        })
        .await;

        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 4 });
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), config.max_attempts * config.delay);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_keeps_fixed_cadence() {
        let config = PollConfig::new(3, Duration::from_secs(1));
        let start = tokio::time::Instant::now();

        let outcome = poll_until(&config, |attempt| async move {
            tokio::time::sleep(Duration::from_millis(400)).await;
            (attempt == 3).then_some(attempt)
        })
        .await;

        assert_eq!(outcome, PollOutcome::Ready { body: 3, attempts: 3 });
        assert_eq!(start.elapsed(), Duration::from_millis(2400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_first_attempt_does_not_sleep() {
        let start = tokio::time::Instant::now();
        let outcome = poll_until(&PollConfig::default(), |_| async { Some(42) }).await;
        assert_eq!(outcome, PollOutcome::Ready { body: 42, attempts: 1 });
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_http_tolerates_startup_latency() {
        let probe = MockProbe::new();
        probe.respond("http://127.0.0.1:32001/", "Hello world");
        probe.fail_first(3);

        let outcome = poll_http(
            &probe,
            "http://127.0.0.1:32001",
            "/",
            &PollConfig::new(10, Duration::from_secs(1)),
        )
        .await;

        assert_eq!(
            outcome,
            PollOutcome::Ready {
                body: "Hello world".to_string(),
                attempts: 4
            }
        );
        assert_eq!(probe.requests().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_distinct_from_content() {
        let probe = MockProbe::new();
        let outcome = poll_http(
            &probe,
            "http://127.0.0.1:1",
            "/",
            &PollConfig::new(3, Duration::from_millis(10)),
        )
        .await;
        assert_eq!(outcome.attempts(), 3);
        let err = outcome.into_body("http://127.0.0.1:1/").unwrap_err();
        assert!(err.to_string().contains("after 3 attempts"));
    }
}
