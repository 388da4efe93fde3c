//! # Sliding-Window Rate Limiter
//!
//! Admits at most `capacity` events in any trailing `window`.
//!
//! ## Algorithm
//!
//! The limiter keeps the admission timestamps in order. On each attempt it
//! evicts timestamps older than `now - window`; if fewer than `capacity`
//! remain, the attempt is admitted and `now` recorded. Otherwise the caller
//! sleeps until the oldest timestamp leaves the window and tries again.
//!
//! The lock is held only across evict-check-admit, never across the
//! sleep, so waiters never block each other while suspended. Several
//! waiters woken for the same freed slot race for it; the first to re-check
//! wins and the rest sleep again. There is no FIFO guarantee, so a waiter
//! can starve under sustained contention.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use shield_monitor::RateLimiter;
//!
//! # async fn example() -> Result<(), shield_monitor::MonitorError> {
//! let limiter = RateLimiter::new(60, Duration::from_secs(60))?;
//! limiter.await_slot().await;
//! assert_eq!(limiter.get_stats().await.current_count, 1);
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{MonitorError, Result};

/// Snapshot of limiter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterStats {
    /// Admissions inside the current window.
    pub current_count: usize,
    /// Maximum admissions per window.
    pub capacity: usize,
    /// Time until the oldest admission leaves the window.
    pub time_until_reset: Duration,
    /// Admissions possible right now without waiting.
    pub available: usize,
}

/// Sliding-window rate limiter shared by every caller of one LLM backend.
///
/// Construct one instance and hand it (behind an `Arc`) to every consumer;
/// independent instances never share state.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter admitting `capacity` events per `window`.
    pub fn new(capacity: usize, window: Duration) -> Result<Self> {
        if capacity == 0 {
            return Err(MonitorError::InvalidConfig(
                "rate limit capacity must be at least 1".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(MonitorError::InvalidConfig(
                "rate limit window must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            capacity,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(capacity)),
        })
    }

    /// Maximum admissions per window.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Suspend until an admission is possible, then record it.
    pub async fn await_slot(&self) {
        loop {
            let wait = match self.try_admit().await {
                Ok(()) => return,
                Err(wait) => wait,
            };
            debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Like [`await_slot`](Self::await_slot), but give up after `max_wait`.
    ///
    /// Giving up leaves the limiter unchanged.
    pub async fn await_slot_timeout(&self, max_wait: Duration) -> Result<()> {
        tokio::time::timeout(max_wait, self.await_slot())
            .await
            .map_err(|_| MonitorError::RateLimitTimeout { waited: max_wait })
    }

    /// Admit immediately if possible. Never suspends for a slot.
    pub async fn try_acquire(&self) -> bool {
        self.try_admit().await.is_ok()
    }

    /// Current limiter state.
    pub async fn get_stats(&self) -> RateLimiterStats {
        let mut timestamps = self.timestamps.lock().await;
        let now = Instant::now();
        self.evict(&mut timestamps, now);

        let time_until_reset = timestamps
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(Duration::ZERO);

        RateLimiterStats {
            current_count: timestamps.len(),
            capacity: self.capacity,
            time_until_reset,
            available: self.capacity.saturating_sub(timestamps.len()),
        }
    }

    /// Evict, check and admit under the lock. On refusal, returns how long
    /// until the oldest admission leaves the window.
    async fn try_admit(&self) -> std::result::Result<(), Duration> {
        let mut timestamps = self.timestamps.lock().await;
        let now = Instant::now();
        self.evict(&mut timestamps, now);

        if timestamps.len() < self.capacity {
            timestamps.push_back(now);
            return Ok(());
        }

        // Non-empty: capacity is at least 1 and the window is full.
        let oldest = timestamps.front().copied().unwrap_or(now);
        Err(self.window.saturating_sub(now.duration_since(oldest)))
    }

    fn evict(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}
