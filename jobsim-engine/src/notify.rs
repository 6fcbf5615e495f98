//! Callback notifications with bounded exponential backoff.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::NotifyError;

/// How many times to try a callback and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt with zero-based index `attempt`:
    /// `base`, `2 * base`, `4 * base`, ...
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Transport used to push a payload to a callback target.
#[async_trait]
pub trait CallbackTransport: Send + Sync {
    /// Deliver `payload` to `target` once.
    async fn deliver(&self, target: &str, payload: &Value) -> Result<(), NotifyError>;
}

/// Posts JSON payloads over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .user_agent(concat!("jobsim/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CallbackTransport for HttpTransport {
    async fn deliver(&self, target: &str, payload: &Value) -> Result<(), NotifyError> {
        let response = self.client.post(target).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Best-effort delivery of terminal job snapshots.
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn CallbackTransport>,
    policy: RetryPolicy,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("transport", &"<dyn CallbackTransport>")
            .field("policy", &self.policy)
            .finish()
    }
}

impl Notifier {
    pub fn new(transport: Arc<dyn CallbackTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Notifier backed by [`HttpTransport`].
    pub fn http(timeout: Duration, policy: RetryPolicy) -> Result<Self, NotifyError> {
        Ok(Self::new(Arc::new(HttpTransport::new(timeout)?), policy))
    }

    #[inline]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Deliver `payload` to `target`, retrying with backoff.
    ///
    /// Returns false once every attempt has failed. Failures are logged and
    /// otherwise swallowed.
    pub async fn notify(&self, target: &str, payload: &Value) -> bool {
        let attempts = self.policy.max_attempts.max(1);
        for attempt in 0..attempts {
            match self.transport.deliver(target, payload).await {
                Ok(()) => {
                    info!(callback = %target, attempt = attempt + 1, "callback delivered");
                    return true;
                }
                Err(e) => {
                    warn!(callback = %target, attempt = attempt + 1, error = %e, "callback delivery failed");
                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.policy.backoff_delay(attempt)).await;
                    }
                }
            }
        }
        warn!(callback = %target, attempts, "giving up on callback");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Fails a fixed number of times, then succeeds; records attempt times.
    struct FlakyTransport {
        failures_left: Mutex<u32>,
        attempts: Mutex<Vec<Instant>>,
    }

    impl FlakyTransport {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: Mutex::new(failures),
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> Vec<Instant> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CallbackTransport for FlakyTransport {
        async fn deliver(&self, _target: &str, _payload: &Value) -> Result<(), NotifyError> {
            self.attempts.lock().unwrap().push(Instant::now());
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(NotifyError::Transport("connection refused".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(4));
        // Saturates instead of overflowing.
        assert_eq!(policy.backoff_delay(40), Duration::from_secs(u32::MAX as u64));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_with_growing_gaps() {
        let transport = Arc::new(FlakyTransport::new(2));
        let notifier = Notifier::new(transport.clone(), RetryPolicy::default());

        let delivered = notifier
            .notify("http://relay/callback/c1", &json!({"jobId": "a"}))
            .await;
        assert!(delivered);

        let attempts = transport.attempts();
        assert_eq!(attempts.len(), 3);
        let first_gap = attempts[1] - attempts[0];
        let second_gap = attempts[2] - attempts[1];
        assert_eq!(first_gap, Duration::from_secs(1));
        assert_eq!(second_gap, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let transport = Arc::new(FlakyTransport::new(10));
        let notifier = Notifier::new(transport.clone(), RetryPolicy::default());

        let started = Instant::now();
        let delivered = notifier.notify("http://relay/callback/c1", &json!({})).await;
        assert!(!delivered);
        assert_eq!(transport.attempts().len(), 3);
        // No sleep after the last attempt.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn http_transport_reports_connection_failure() {
        let notifier = Notifier::http(
            Duration::from_millis(200),
            RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
            },
        )
        .expect("client builds");
        // Port 9 (discard) on localhost is not listening in test environments.
        assert!(!notifier.notify("http://127.0.0.1:9/callback", &json!({})).await);
    }
}
