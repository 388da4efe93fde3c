//! # Shield Monitor
//!
//! Admission control for LLM calls: a shared sliding-window rate limiter
//! and a consumption governor bounding concurrency, token spend and
//! wall-clock time per operation.
//!
//! ## Threat Model
//!
//! An LLM backend is a metered, rate-limited resource. Unbounded callers
//! lead to:
//! - **Quota exhaustion** (rate limiter: sliding window)
//! - **Cost blow-up** (token budget per request)
//! - **Resource pile-up** (concurrency cap with a deadline)
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`RateLimiter`] | At most `capacity` admissions per trailing window |
//! | [`ConsumptionGovernor`] | Scoped permit, rate slot, deadline |
//! | [`ConsumptionScope`] | RAII guard for one in-flight operation |
//! | [`TokenBudget`] | Per-request token accounting |
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use shield_monitor::{estimate_tokens, ConsumptionGovernor, GovernorConfig, RateLimiter};
//!
//! # async fn example() -> Result<(), shield_monitor::MonitorError> {
//! let limiter = Arc::new(RateLimiter::new(60, Duration::from_secs(60))?);
//! let governor = ConsumptionGovernor::new(GovernorConfig::new(), limiter)?;
//!
//! let prompt = "Summarize the following page...";
//! let mut scope = governor.enter().await?;
//! scope.consume(estimate_tokens(prompt))?;
//! let generated = scope.within_deadline(async { "A summary.".to_string() }).await?;
//! drop(scope); // permit released
//! # let _ = generated;
//! # Ok(())
//! # }
//! ```
//!
//! ## Security Notes
//!
//! - Share ONE [`RateLimiter`] per backend; separate instances never
//!   coordinate
//! - All checks execute BEFORE the guarded operation
//! - Permits are released by drop, never by hand

mod budget;
mod error;
mod governor;
mod rate;

pub use budget::{estimate_tokens, TokenBudget, DEFAULT_MAX_TOKENS};
pub use error::{MonitorError, Result, TimeoutPhase};
pub use governor::{ConsumptionGovernor, ConsumptionScope, GovernorConfig, GovernorStatus};
pub use rate::{RateLimiter, RateLimiterStats};
