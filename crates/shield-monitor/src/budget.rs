//! # Token Budget
//!
//! Bounds the tokens a single governed operation may spend on an LLM call.
//!
//! ## Design
//!
//! A budget starts at the per-request maximum and only decreases. Usage is
//! checked BEFORE the work it pays for, and a failed check leaves the
//! budget untouched.
//!
//! Token counts are estimates: [`estimate_tokens`] uses the common
//! four-characters-per-token heuristic, which is close enough for English
//! text to bound cost without a tokenizer.
//!
//! ## Example
//!
//! ```rust
//! use shield_monitor::{estimate_tokens, TokenBudget};
//!
//! let mut budget = TokenBudget::new(100);
//! budget.consume(estimate_tokens("a prompt of forty characters, roughly.."))?;
//! assert_eq!(budget.remaining(), 90);
//! # Ok::<(), shield_monitor::MonitorError>(())
//! ```

use crate::error::{MonitorError, Result};

/// Default per-request token budget.
pub const DEFAULT_MAX_TOKENS: u64 = 8_192;

/// Estimate the token count of `text` as ceil(chars / 4).
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Tracks token spend against a fixed limit.
///
/// # Security Notes
///
/// - **No overdraft**: [`consume`](Self::consume) fails instead of going negative
/// - **Unchanged on failure**: a rejected request deducts nothing
#[derive(Debug, Clone)]
pub struct TokenBudget {
    /// Limit (immutable after creation).
    limit: u64,
    /// Tokens left.
    remaining: u64,
}

impl TokenBudget {
    /// Creates a budget of `limit` tokens.
    #[must_use]
    pub const fn new(limit: u64) -> Self {
        Self {
            limit,
            remaining: limit,
        }
    }

    /// Returns the limit.
    #[inline]
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// Returns the tokens left.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Returns the tokens spent so far.
    #[inline]
    #[must_use]
    pub const fn consumed(&self) -> u64 {
        self.limit - self.remaining
    }

    /// Returns the spent fraction (0.0 to 1.0); 0.0 for a zero limit.
    #[inline]
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.limit == 0 {
            0.0
        } else {
            self.consumed() as f64 / self.limit as f64
        }
    }

    /// Checks that `tokens` fit without spending them.
    pub fn check(&self, tokens: u64) -> Result<()> {
        if tokens > self.remaining {
            return Err(MonitorError::TokenBudgetExceeded {
                required: tokens,
                available: self.remaining,
            });
        }
        Ok(())
    }

    /// Spends `tokens`, returning the remaining balance.
    pub fn consume(&mut self, tokens: u64) -> Result<u64> {
        self.check(tokens)?;
        self.remaining -= tokens;
        Ok(self.remaining)
    }

    /// Returns true if nothing is left.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS)
    }
}
