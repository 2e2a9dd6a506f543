//! Resilient executor
//!
//! Wraps page operations in a retry loop that classifies every failure
//! against the live page, rotates identities on blocks, waits out CAPTCHA
//! challenges when allowed, and bounds everything with an overall deadline.

mod policy;

pub use policy::RetryPolicy;

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::driver::PageDriver;
use crate::error::{ErrorKind, HarvestError};
use crate::evasion::{self, PageState};
use crate::identity::{Identity, IdentityPool};

/// Duration fields serialized as integer milliseconds.
pub(crate) mod serde_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Runs page operations under a retry policy against one driver session.
///
/// The executor owns the session's current identity: a block rotates it (and
/// retires the offending proxy) so every later operation in the session
/// presents the fresh fingerprint.
pub struct ResilientExecutor<'a> {
    driver: &'a dyn PageDriver,
    identities: &'a IdentityPool,
    current: Mutex<Identity>,
    deadline: Option<Instant>,
}

impl<'a> ResilientExecutor<'a> {
    pub fn new(driver: &'a dyn PageDriver, identities: &'a IdentityPool, identity: Identity) -> Self {
        Self {
            driver,
            identities,
            current: Mutex::new(identity),
            deadline: None,
        }
    }

    /// Bound the whole run (attempts, backoffs and CAPTCHA waits included).
    pub fn with_deadline(mut self, budget: Duration) -> Self {
        self.deadline = Some(Instant::now() + budget);
        self
    }

    /// The identity currently presented by the session.
    pub fn current_identity(&self) -> Identity {
        self.current.lock().clone()
    }

    /// Run `op` until it succeeds or the policy is exhausted.
    ///
    /// Every failed attempt is classified against the live page: a transient
    /// error on a block interstitial is treated as a block (identity rotated
    /// before the retry), and a CAPTCHA page enters the wait loop as long as
    /// attempts remain. Non-retryable errors return immediately.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        policy: &RetryPolicy,
        mut op: F,
    ) -> Result<T, HarvestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HarvestError>>,
    {
        policy.validate()?;

        let mut attempt = 0u32;
        let mut bonus_rotation_used = false;

        loop {
            attempt += 1;
            self.check_deadline(label)?;
            debug!("{}: attempt {}/{}", label, attempt, policy.max_attempts);

            let outcome = op().await;

            // Classify the page regardless of the operation outcome: a
            // "successful" operation on a block interstitial harvested
            // nothing real, and a failure can look transient while the
            // actual cause is a defense page.
            let state = match evasion::classify(self.driver).await {
                Ok(state) => state,
                Err(_) => PageState::Clean,
            };

            let err = match (outcome, state) {
                (Ok(value), PageState::Clean) => return Ok(value),
                (_, PageState::CaptchaChallenged)
                    if policy.captcha_retry_enabled && attempt < policy.max_attempts =>
                {
                    self.wait_for_captcha(label, policy).await?;
                    info!("{}: CAPTCHA cleared, retrying", label);
                    continue;
                }
                (_, PageState::CaptchaChallenged) if policy.captcha_retry_enabled => {
                    HarvestError::Blocked("CAPTCHA page still present on the final attempt".to_string())
                }
                (_, PageState::CaptchaChallenged) => {
                    HarvestError::Blocked("CAPTCHA challenge (waits disabled)".to_string())
                }
                (Ok(_), PageState::Blocked) => {
                    HarvestError::Blocked("operation landed on a block interstitial".to_string())
                }
                (Err(e), PageState::Blocked) => HarvestError::Blocked(e.to_string()),
                (Err(e), PageState::Clean) => e,
            };

            if !policy.is_retryable(&err) {
                warn!("{}: non-retryable failure: {}", label, err);
                return Err(err);
            }

            if attempt >= policy.max_attempts {
                // One extra rotation when a block ends the run and CAPTCHA
                // waits were disabled: a fresh identity is the only remaining
                // lever, so it gets a single shot.
                if err.kind() == ErrorKind::Blocked
                    && !policy.captcha_retry_enabled
                    && !bonus_rotation_used
                {
                    bonus_rotation_used = true;
                    info!("{}: attempts exhausted by a block, trying one fresh identity", label);
                    self.rotate_identity().await;
                    continue;
                }
                warn!("{}: giving up after {} attempt(s): {}", label, attempt, err);
                return Err(err);
            }

            if err.kind() == ErrorKind::Blocked {
                self.rotate_identity().await;
            }

            let backoff = policy.backoff_for(attempt);
            debug!("{}: backing off {:?} before retry", label, backoff);
            self.sleep_bounded(label, backoff).await?;
        }
    }

    /// Retire the proxy behind the current identity and present a fresh one.
    async fn rotate_identity(&self) {
        let retiring = self.current.lock().clone();
        if let Some(ref endpoint) = retiring.proxy_endpoint {
            self.identities.mark_unhealthy(endpoint);
        }

        let fresh = self.identities.issue_identity();
        info!(
            "Rotating identity (proxy {:?} -> {:?})",
            retiring.proxy_endpoint, fresh.proxy_endpoint
        );
        evasion::prepare(self.driver, &fresh).await;
        *self.current.lock() = fresh;
    }

    /// Poll the page until the CAPTCHA clears or the wait window closes.
    async fn wait_for_captcha(&self, label: &str, policy: &RetryPolicy) -> Result<(), HarvestError> {
        info!(
            "{}: CAPTCHA detected, waiting up to {:?} for it to clear",
            label, policy.captcha_wait_timeout
        );

        let started = Instant::now();
        loop {
            let waited = started.elapsed();
            if waited >= policy.captcha_wait_timeout {
                return Err(HarvestError::CaptchaUnresolved { waited });
            }

            self.sleep_bounded(label, policy.captcha_poll_interval).await?;

            match evasion::classify(self.driver).await? {
                PageState::Clean => return Ok(()),
                PageState::CaptchaChallenged => continue,
                PageState::Blocked => {
                    return Err(HarvestError::Blocked(
                        "page turned into a hard block during CAPTCHA wait".to_string(),
                    ))
                }
            }
        }
    }

    fn check_deadline(&self, label: &str) -> Result<(), HarvestError> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(HarvestError::Timeout(format!(
                    "{}: overall deadline exceeded",
                    label
                )));
            }
        }
        Ok(())
    }

    /// Sleep, but never past the overall deadline.
    async fn sleep_bounded(&self, label: &str, duration: Duration) -> Result<(), HarvestError> {
        if let Some(deadline) = self.deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if duration >= remaining {
                return Err(HarvestError::Timeout(format!(
                    "{}: deadline leaves no room for a {:?} wait",
                    label, duration
                )));
            }
        }
        sleep(duration).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;

    const CLEAN: &str = "<html><body><div class='review-item'>fine</div></body></html>";
    const BLOCKED: &str = "<html><body><h1>Access Denied</h1></body></html>";
    const CAPTCHA: &str = "<html><body><div class='g-recaptcha'></div></body></html>";

    /// Driver whose HTML snapshots come from a canned sequence; the last
    /// entry repeats once the sequence is exhausted.
    struct MockDriver {
        htmls: Mutex<VecDeque<&'static str>>,
    }

    impl MockDriver {
        fn with_htmls(htmls: &[&'static str]) -> Self {
            Self {
                htmls: Mutex::new(htmls.iter().copied().collect()),
            }
        }
    }

    #[async_trait]
    impl PageDriver for MockDriver {
        async fn navigate(&self, _url: &str) -> Result<(), HarvestError> {
            Ok(())
        }
        async fn execute_script(&self, _script: &str) -> Result<serde_json::Value, HarvestError> {
            Ok(serde_json::Value::Null)
        }
        async fn click(&self, _selector: &str) -> Result<(), HarvestError> {
            Ok(())
        }
        async fn element_count(&self, _selector: &str) -> Result<usize, HarvestError> {
            Ok(0)
        }
        async fn current_html(&self) -> Result<String, HarvestError> {
            let mut htmls = self.htmls.lock();
            let html = if htmls.len() > 1 {
                htmls.pop_front().unwrap_or(CLEAN)
            } else {
                htmls.front().copied().unwrap_or(CLEAN)
            };
            Ok(html.to_string())
        }
        async fn screenshot(&self, _path: &Path) -> Result<(), HarvestError> {
            Ok(())
        }
        async fn apply_identity(&self, _identity: &Identity) -> Result<(), HarvestError> {
            Ok(())
        }
        fn is_alive(&self) -> bool {
            true
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            captcha_wait_timeout: Duration::from_millis(100),
            captcha_poll_interval: Duration::from_millis(10),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_success_skips_retries() {
        let driver = MockDriver::with_htmls(&[CLEAN]);
        let pool = IdentityPool::direct();
        let exec = ResilientExecutor::new(&driver, &pool, pool.issue_identity());

        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();
        let result = exec
            .run("op", &fast_policy(), || {
                let calls = calls_in_op.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, HarvestError>(42)
                }
            })
            .await;

        assert_eq!(result.ok(), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_use_exactly_max_attempts() {
        let driver = MockDriver::with_htmls(&[CLEAN]);
        let pool = IdentityPool::direct();
        let exec = ResilientExecutor::new(&driver, &pool, pool.issue_identity());

        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();
        let result: Result<(), _> = exec
            .run("op", &fast_policy(), || {
                let calls = calls_in_op.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(HarvestError::TransientPage("element not found".into()))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(HarvestError::TransientPage(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn block_rotates_identity_and_retires_proxy() {
        // Blocked on the first two attempts, clean afterwards.
        let driver = MockDriver::with_htmls(&[BLOCKED, BLOCKED, CLEAN]);
        let pool = IdentityPool::new(vec!["p1:8080".into(), "p2:8080".into(), "p3:8080".into()]);
        let initial = pool.issue_identity();
        let exec = ResilientExecutor::new(&driver, &pool, initial.clone());

        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();
        let result = exec
            .run("op", &fast_policy(), || {
                let calls = calls_in_op.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(HarvestError::TransientPage("load failed".into()))
                    } else {
                        Ok("reviews")
                    }
                }
            })
            .await;

        assert_eq!(result.ok(), Some("reviews"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two rotations retired two of the three proxies, and the success
        // came through the identity issued for the third attempt.
        assert_eq!(pool.healthy_count(), 1);
        let current = exec.current_identity();
        assert_ne!(current.proxy_endpoint, initial.proxy_endpoint);
        assert_eq!(current.proxy_endpoint.as_deref(), Some("p3:8080"));
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_captcha_fails_with_wait_duration() {
        let driver = MockDriver::with_htmls(&[CAPTCHA]);
        let pool = IdentityPool::direct();
        let exec = ResilientExecutor::new(&driver, &pool, pool.issue_identity());

        let result: Result<(), _> = exec
            .run("op", &fast_policy(), || async {
                Err(HarvestError::TransientPage("overlay in the way".into()))
            })
            .await;

        match result {
            Err(HarvestError::CaptchaUnresolved { waited }) => {
                assert!(waited >= Duration::from_millis(100));
            }
            other => panic!("expected CaptchaUnresolved, got {:?}", other.err()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cleared_captcha_leads_to_retry_and_success() {
        // First snapshot (post-failure classify) and second (first poll) show
        // the widget; the third poll sees a clean page.
        let driver = MockDriver::with_htmls(&[CAPTCHA, CAPTCHA, CLEAN]);
        let pool = IdentityPool::direct();
        let exec = ResilientExecutor::new(&driver, &pool, pool.issue_identity());

        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();
        let result = exec
            .run("op", &fast_policy(), || {
                let calls = calls_in_op.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(HarvestError::TransientPage("challenge overlay".into()))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.ok(), Some("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn oscillating_captcha_page_stops_at_max_attempts() {
        // The page flips between a CAPTCHA widget and clean content while
        // the operation keeps failing. Waiting out challenges must not grant
        // invocations beyond the configured maximum.
        let driver = MockDriver::with_htmls(&[CAPTCHA, CLEAN, CAPTCHA, CLEAN, CAPTCHA]);
        let pool = IdentityPool::direct();
        let exec = ResilientExecutor::new(&driver, &pool, pool.issue_identity());

        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();
        let result: Result<(), _> = exec
            .run("op", &fast_policy(), || {
                let calls = calls_in_op.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(HarvestError::TransientPage("overlay flicker".into()))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(HarvestError::Blocked(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_returns_immediately() {
        let driver = MockDriver::with_htmls(&[CLEAN]);
        let pool = IdentityPool::direct();
        let exec = ResilientExecutor::new(&driver, &pool, pool.issue_identity());

        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();
        let result: Result<(), _> = exec
            .run("op", &fast_policy(), || {
                let calls = calls_in_op.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(HarvestError::Configuration("bad selector set".into()))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(HarvestError::Configuration(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn final_block_with_waits_disabled_gets_one_bonus_rotation() {
        let driver = MockDriver::with_htmls(&[BLOCKED, CLEAN]);
        let pool = IdentityPool::new(vec!["p1:8080".into(), "p2:8080".into()]);
        let exec = ResilientExecutor::new(&driver, &pool, pool.issue_identity());

        let policy = RetryPolicy {
            max_attempts: 1,
            captcha_retry_enabled: false,
            ..fast_policy()
        };

        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();
        let result = exec
            .run("op", &policy, || {
                let calls = calls_in_op.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(HarvestError::TransientPage("load failed".into()))
                    } else {
                        Ok("late success")
                    }
                }
            })
            .await;

        assert_eq!(result.ok(), Some("late success"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_bounds_backoff_sleeps() {
        let driver = MockDriver::with_htmls(&[CLEAN]);
        let pool = IdentityPool::direct();
        let exec = ResilientExecutor::new(&driver, &pool, pool.issue_identity())
            .with_deadline(Duration::from_millis(5));

        let policy = RetryPolicy {
            initial_backoff: Duration::from_secs(60),
            ..fast_policy()
        };

        let result: Result<(), _> = exec
            .run("op", &policy, || async {
                Err(HarvestError::TransientPage("flaky".into()))
            })
            .await;

        assert!(matches!(result, Err(HarvestError::Timeout(_))));
    }
}
