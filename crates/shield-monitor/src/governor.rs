//! # Consumption Governor
//!
//! Scoped admission for LLM calls: one guard bounds concurrency, rate,
//! token spend and wall-clock time for a single operation.
//!
//! ## Entering a scope
//!
//! 1. Acquire one of `max_concurrent` permits (bounded by `timeout`)
//! 2. Wait for a [`RateLimiter`] slot (optionally bounded)
//! 3. Start the `timeout` deadline and open a `consumption_scope` span
//!
//! ## Leaving a scope
//!
//! The permit is owned by the [`ConsumptionScope`] and returned to the
//! semaphore when the scope is dropped. Dropping happens on every exit
//! path: normal return, `?` propagation, panic unwinding, task abort and
//! deadline expiry. There is no manual release call to forget.
//!
//! ## Security Notes
//!
//! - Token usage is checked BEFORE the wrapped operation is polled
//! - Deadline expiry drops the in-flight future, cancelling it
//! - A timed-out wait for a permit or a rate slot holds nothing afterwards
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use shield_monitor::{ConsumptionGovernor, GovernorConfig, RateLimiter};
//!
//! # async fn example() -> Result<(), shield_monitor::MonitorError> {
//! let limiter = Arc::new(RateLimiter::new(60, Duration::from_secs(60))?);
//! let governor = ConsumptionGovernor::new(
//!     GovernorConfig::new().with_max_concurrent(2).with_max_tokens(4_096),
//!     limiter,
//! )?;
//!
//! let summary = governor.run(120, async { "generated text".to_string() }).await?;
//! assert_eq!(summary, "generated text");
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::budget::{TokenBudget, DEFAULT_MAX_TOKENS};
use crate::error::{MonitorError, Result, TimeoutPhase};
use crate::rate::{RateLimiter, RateLimiterStats};

/// Stand-in for deadlines too far ahead to represent (about 30 years).
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Configuration for [`ConsumptionGovernor`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use shield_monitor::GovernorConfig;
///
/// let config = GovernorConfig::new()
///     .with_max_concurrent(8)
///     .with_timeout(Duration::from_secs(30));
/// assert_eq!(config.max_concurrent, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernorConfig {
    /// Maximum simultaneously open scopes.
    pub max_concurrent: usize,
    /// Per-scope token budget.
    pub max_tokens: u64,
    /// Deadline for permit acquisition, and again for the operation.
    pub timeout: Duration,
    /// Upper bound on the rate-limit wait; `None` waits indefinitely.
    pub rate_limit_max_wait: Option<Duration>,
}

impl GovernorConfig {
    /// Creates a config with default values.
    ///
    /// Defaults:
    /// - Max concurrent: 4
    /// - Max tokens: 8,192
    /// - Timeout: 60 seconds
    /// - Rate-limit wait: unbounded
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_concurrent: 4,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(60),
            rate_limit_max_wait: None,
        }
    }

    /// Sets the concurrency cap.
    #[must_use]
    pub const fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Sets the per-scope token budget.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bounds the rate-limit wait.
    #[must_use]
    pub const fn with_rate_limit_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.rate_limit_max_wait = max_wait;
        self
    }
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GovernorStatus {
    /// Concurrency cap.
    pub max_concurrent: usize,
    /// Permits free right now.
    pub available_permits: usize,
    /// Scopes currently open.
    pub open_scopes: usize,
    /// Shared limiter state.
    pub rate_limiter: RateLimiterStats,
}

/// Guards LLM calls with a concurrency cap, the shared rate limiter,
/// a token budget and a deadline.
///
/// Cloning is cheap and clones share permits and limiter.
#[derive(Debug, Clone)]
pub struct ConsumptionGovernor {
    config: GovernorConfig,
    permits: Arc<Semaphore>,
    limiter: Arc<RateLimiter>,
    open_scopes: Arc<AtomicUsize>,
}

impl ConsumptionGovernor {
    /// Creates a governor drawing rate slots from `limiter`.
    pub fn new(config: GovernorConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        if config.max_concurrent == 0 {
            return Err(MonitorError::InvalidConfig(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if config.timeout.is_zero() {
            return Err(MonitorError::InvalidConfig(
                "timeout must be non-zero".to_string(),
            ));
        }

        Ok(Self {
            permits: Arc::new(Semaphore::new(config.max_concurrent)),
            config,
            limiter,
            open_scopes: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// The shared rate limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Opens a scope. The returned guard holds a concurrency permit until
    /// it is dropped.
    pub async fn enter(&self) -> Result<ConsumptionScope> {
        let id = Uuid::new_v4();

        let permit = match tokio::time::timeout(
            self.config.timeout,
            self.permits.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(MonitorError::Closed),
            Err(_) => {
                warn!(scope_id = %id, timeout_ms = self.config.timeout.as_millis() as u64, "no concurrency permit before deadline");
                return Err(MonitorError::ConcurrencyTimeout {
                    phase: TimeoutPhase::AwaitingPermit,
                    timeout: self.config.timeout,
                });
            }
        };

        match self.config.rate_limit_max_wait {
            Some(max_wait) => self.limiter.await_slot_timeout(max_wait).await?,
            None => self.limiter.await_slot().await,
        }

        let open = self.open_scopes.fetch_add(1, Ordering::SeqCst) + 1;
        let span = info_span!("consumption_scope", scope_id = %id);
        span.in_scope(|| debug!(open_scopes = open, "scope opened"));

        let opened_at = Instant::now();
        Ok(ConsumptionScope {
            id,
            budget: TokenBudget::new(self.config.max_tokens),
            deadline: deadline_after(opened_at, self.config.timeout),
            timeout: self.config.timeout,
            span,
            opened_at,
            open_scopes: self.open_scopes.clone(),
            _permit: permit,
        })
    }

    /// Runs `operation` inside a fresh scope.
    ///
    /// `estimated_tokens` is charged before the operation is polled; if it
    /// does not fit, the operation never runs. The operation is cancelled if
    /// it outlives the deadline.
    pub async fn run<F, T>(&self, estimated_tokens: u64, operation: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let mut scope = self.enter().await?;
        scope.consume(estimated_tokens)?;
        scope.within_deadline(operation).await
    }

    /// Current permits, open scopes and limiter state.
    pub async fn status(&self) -> GovernorStatus {
        GovernorStatus {
            max_concurrent: self.config.max_concurrent,
            available_permits: self.permits.available_permits(),
            open_scopes: self.open_scopes.load(Ordering::SeqCst),
            rate_limiter: self.limiter.get_stats().await,
        }
    }

    /// Stops admitting new scopes. Open scopes run to completion; later
    /// [`enter`](Self::enter) calls fail with [`MonitorError::Closed`].
    pub fn close(&self) {
        self.permits.close();
    }
}

/// One governed operation in flight.
///
/// Exclusively owned by that operation. Dropping it releases the
/// concurrency permit.
#[derive(Debug)]
pub struct ConsumptionScope {
    id: Uuid,
    budget: TokenBudget,
    deadline: Instant,
    timeout: Duration,
    span: Span,
    opened_at: Instant,
    open_scopes: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl ConsumptionScope {
    /// Correlation id, also recorded on the scope's span.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Instant the operation must finish by.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline.
    pub fn remaining_time(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Token budget of this scope.
    pub fn max_tokens(&self) -> u64 {
        self.budget.limit()
    }

    /// Tokens charged so far.
    pub fn tokens_used(&self) -> u64 {
        self.budget.consumed()
    }

    /// Tokens still available.
    pub fn tokens_remaining(&self) -> u64 {
        self.budget.remaining()
    }

    /// Checks that `tokens` fit without charging them.
    pub fn check_tokens(&self, tokens: u64) -> Result<()> {
        self.budget.check(tokens)
    }

    /// Charges `tokens` against the budget.
    pub fn consume(&mut self, tokens: u64) -> Result<u64> {
        match self.budget.consume(tokens) {
            Ok(remaining) => Ok(remaining),
            Err(err) => {
                self.span.in_scope(|| {
                    warn!(required = tokens, available = self.budget.remaining(), "token budget exceeded")
                });
                Err(err)
            }
        }
    }

    /// Drives `operation` to completion or until the deadline, whichever
    /// comes first. The operation runs inside the scope's span.
    pub async fn within_deadline<F, T>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        match tokio::time::timeout_at(self.deadline, operation.instrument(self.span.clone())).await
        {
            Ok(value) => Ok(value),
            Err(_) => {
                self.span.in_scope(|| {
                    warn!(timeout_ms = self.timeout.as_millis() as u64, "operation cancelled at deadline")
                });
                Err(MonitorError::ConcurrencyTimeout {
                    phase: TimeoutPhase::Running,
                    timeout: self.timeout,
                })
            }
        }
    }
}

impl Drop for ConsumptionScope {
    fn drop(&mut self) {
        let open = self.open_scopes.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        self.span.in_scope(|| {
            debug!(
                tokens_used = self.budget.consumed(),
                elapsed_ms = self.opened_at.elapsed().as_millis() as u64,
                open_scopes = open,
                "scope closed"
            )
        });
    }
}

fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    fn governor(config: GovernorConfig) -> ConsumptionGovernor {
        let limiter = Arc::new(RateLimiter::new(1_000, Duration::from_secs(60)).unwrap());
        ConsumptionGovernor::new(config, limiter).unwrap()
    }

    async fn assert_idle(governor: &ConsumptionGovernor) {
        let status = governor.status().await;
        assert_eq!(status.open_scopes, 0);
        assert_eq!(status.available_permits, status.max_concurrent);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(1)).unwrap());
        assert!(ConsumptionGovernor::new(
            GovernorConfig::new().with_max_concurrent(0),
            limiter.clone()
        )
        .is_err());
        assert!(ConsumptionGovernor::new(
            GovernorConfig::new().with_timeout(Duration::ZERO),
            limiter
        )
        .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_cap_holds() {
        let governor = governor(GovernorConfig::new().with_max_concurrent(2));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let governor = governor.clone();
            let current = current.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                governor
                    .run(10, async {
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        current.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_idle(&governor).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_released_on_error() {
        let governor = governor(GovernorConfig::new().with_max_concurrent(1));
        let result = governor.run(1, async { Err::<(), &str>("boom") }).await;
        assert_eq!(result.unwrap(), Err("boom"));
        assert_idle(&governor).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_released_on_panic() {
        let governor = governor(GovernorConfig::new().with_max_concurrent(1));
        let task_governor = governor.clone();
        let handle = tokio::spawn(async move {
            task_governor
                .run(1, async {
                    panic!("operation failed");
                })
                .await
        });
        assert!(handle.await.unwrap_err().is_panic());
        assert_idle(&governor).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_released_on_cancellation() {
        let governor = governor(GovernorConfig::new().with_max_concurrent(1));
        let task_governor = governor.clone();
        let handle = tokio::spawn(async move {
            task_governor.run(1, std::future::pending::<()>()).await
        });

        while governor.status().await.open_scopes == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(governor.status().await.available_permits, 0);

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert_idle(&governor).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_operation() {
        let governor = governor(
            GovernorConfig::new()
                .with_max_concurrent(1)
                .with_timeout(Duration::from_secs(1)),
        );
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let err = governor
            .run(1, async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                flag.store(true, Ordering::SeqCst);
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MonitorError::ConcurrencyTimeout {
                phase: TimeoutPhase::Running,
                ..
            }
        ));
        assert!(err.is_retryable());
        assert!(!finished.load(Ordering::SeqCst));
        assert_idle(&governor).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_budget_checked_before_running() {
        let governor = governor(GovernorConfig::new().with_max_tokens(100));
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        let err = governor
            .run(101, async move { flag.store(true, Ordering::SeqCst) })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MonitorError::TokenBudgetExceeded {
                required: 101,
                available: 100
            }
        ));
        assert!(!ran.load(Ordering::SeqCst));
        assert_idle(&governor).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_wait_times_out() {
        let governor = governor(
            GovernorConfig::new()
                .with_max_concurrent(1)
                .with_timeout(Duration::from_secs(1)),
        );
        let held = governor.enter().await.unwrap();

        let err = governor.enter().await.unwrap_err();
        assert!(matches!(
            err,
            MonitorError::ConcurrencyTimeout {
                phase: TimeoutPhase::AwaitingPermit,
                ..
            }
        ));

        drop(held);
        assert_idle(&governor).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_rate_wait_releases_permit() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(60)).unwrap());
        let governor = ConsumptionGovernor::new(
            GovernorConfig::new().with_rate_limit_max_wait(Some(Duration::from_secs(1))),
            limiter,
        )
        .unwrap();

        governor.run(1, async {}).await.unwrap();
        let err = governor.run(1, async {}).await.unwrap_err();
        assert!(matches!(err, MonitorError::RateLimitTimeout { .. }));
        assert_idle(&governor).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_scope_tracks_tokens_and_deadline() {
        let governor = governor(
            GovernorConfig::new()
                .with_max_tokens(100)
                .with_timeout(Duration::from_secs(30)),
        );
        let mut scope = governor.enter().await.unwrap();

        assert_eq!(scope.consume(30).unwrap(), 70);
        assert_eq!(scope.tokens_used(), 30);
        assert_eq!(scope.tokens_remaining(), 70);
        assert!(scope.check_tokens(71).is_err());
        assert_eq!(scope.max_tokens(), 100);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(scope.remaining_time(), Duration::from_secs(20));
        assert_eq!(governor.status().await.open_scopes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_governor_rejects_entry() {
        let governor = governor(GovernorConfig::new());
        governor.close();
        assert!(matches!(
            governor.enter().await.unwrap_err(),
            MonitorError::Closed
        ));
    }

    #[tokio::test]
    async fn test_scope_ids_are_unique() {
        let governor = governor(GovernorConfig::new());
        let a = governor.enter().await.unwrap();
        let b = governor.enter().await.unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_timeout_does_not_overflow() {
        let governor = governor(
            GovernorConfig::new().with_timeout(Duration::from_secs(i64::MAX as u64)),
        );
        let scope = governor.enter().await.unwrap();
        assert!(scope.remaining_time() >= Duration::from_secs(86_400 * 365));

        let value = scope.within_deadline(async { 7 }).await.unwrap();
        assert_eq!(value, 7);
    }
}
