//! Classification-driven retry with exponential backoff.
//!
//! The executor wraps one transport invocation attempt and decides, per
//! error category, whether another attempt is allowed:
//!
//! - rate limits always retry, honoring the service-advertised interval
//!   when present and the doubling backoff otherwise;
//! - authentication failures offer interactive credential replacement,
//!   at most once per invocation;
//! - server errors retry only on an affirmative external decision, so
//!   operators keep control over server-side failures;
//! - everything else is fatal and surfaced unmodified.
//!
//! Interactive decisions are injected through [`RecoveryHooks`] so the
//! control logic is testable without real input.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use secrecy::SecretString;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::defaults;
use crate::error::{ChatError, ErrorCategory};
use crate::transport::ChatTransport;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays. Off by default so the delay
    /// sequence `min(initial * 2^k, max)` holds exactly.
    pub use_jitter: bool,
    /// Maximum jitter fraction (0.0 to 1.0).
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(defaults::DEFAULT_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(defaults::DEFAULT_MAX_RETRY_DELAY_MS),
            backoff_multiplier: 2.0,
            use_jitter: false,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub const fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Delay before the retry following backoff step `step` (0-based).
    pub fn calculate_delay(&self, step: u32) -> Duration {
        let base =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(step as i32);
        let delay = Duration::from_millis(base as u64).min(self.max_delay);
        if self.use_jitter {
            self.add_jitter(delay)
        } else {
            delay
        }
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let range = delay.as_millis() as f64 * self.jitter_factor;
        let jitter = rng.gen_range(-range..=range);
        Duration::from_millis((delay.as_millis() as f64 + jitter).max(0.0) as u64)
    }
}

/// Interactive decisions solicited by the executor.
#[async_trait]
pub trait RecoveryHooks: Send + Sync {
    /// Asks for a replacement credential after an authentication failure.
    /// Returning `None` abstains and the failure becomes fatal.
    async fn request_credential(&self) -> Option<SecretString>;

    /// Asks whether a server-side failure should be retried.
    async fn confirm_retry(&self, error: &ChatError) -> bool;
}

/// Default hooks for headless operation: abstain and decline.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoninteractiveHooks;

#[async_trait]
impl RecoveryHooks for NoninteractiveHooks {
    async fn request_credential(&self) -> Option<SecretString> {
        None
    }

    async fn confirm_retry(&self, _error: &ChatError) -> bool {
        false
    }
}

/// Executes one invocation with classification-driven retries.
pub struct RetryExecutor {
    policy: RetryPolicy,
    hooks: Arc<dyn RecoveryHooks>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            hooks: Arc::new(NoninteractiveHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn RecoveryHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes without a credential-installation target; authentication
    /// failures are fatal even if the hooks could supply a credential.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, ChatError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ChatError>>,
    {
        self.run(None, operation).await
    }

    /// Executes with interactive recovery: replacement credentials are
    /// installed into `transport` before the retry.
    pub async fn execute_with_recovery<F, Fut, T>(
        &self,
        transport: &dyn ChatTransport,
        operation: F,
    ) -> Result<T, ChatError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ChatError>>,
    {
        self.run(Some(transport), operation).await
    }

    async fn run<F, Fut, T>(
        &self,
        transport: Option<&dyn ChatTransport>,
        mut operation: F,
    ) -> Result<T, ChatError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ChatError>>,
    {
        let mut backoff_step: u32 = 0;
        let mut credential_retry_used = false;

        for attempt in 1..=self.policy.max_attempts {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if attempt == self.policy.max_attempts {
                return Err(error);
            }

            match error.category() {
                ErrorCategory::RateLimit => {
                    let delay = error
                        .retry_after()
                        .unwrap_or_else(|| self.policy.calculate_delay(backoff_step));
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, waiting before retry"
                    );
                    sleep(delay).await;
                    backoff_step += 1;
                }
                ErrorCategory::Auth => {
                    if credential_retry_used {
                        return Err(error);
                    }
                    let Some(transport) = transport else {
                        return Err(error);
                    };
                    let Some(credential) = self.hooks.request_credential().await else {
                        return Err(error);
                    };
                    if transport.update_credential(credential).await.is_err() {
                        return Err(error);
                    }
                    credential_retry_used = true;
                    debug!(attempt, "credential replaced, retrying");
                }
                ErrorCategory::Server => {
                    if !self.hooks.confirm_retry(&error).await {
                        return Err(error);
                    }
                    let delay = self.policy.calculate_delay(backoff_step);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "server error, retry confirmed"
                    );
                    sleep(delay).await;
                    backoff_step += 1;
                }
                _ => return Err(error),
            }
        }

        Err(ChatError::InternalError(
            "retry loop exited without resolution".to_string(),
        ))
    }
}
