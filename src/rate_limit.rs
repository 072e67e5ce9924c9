//! Per-key sliding-window request throttle.
//!
//! Every key keeps the timestamps of its accepted requests inside the trailing
//! window. A request is accepted while fewer than `limit` timestamps remain
//! after pruning.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{OsintError, Result};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
const DEFAULT_SWEEP_THRESHOLD: usize = 1024;

pub struct RateLimiter {
    limit: usize,
    window: Duration,
    sweep_threshold: usize,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(rate_per_minute: u32) -> Self {
        Self::with_window(rate_per_minute, DEFAULT_WINDOW)
    }

    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1) as usize,
            window,
            sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Number of tracked keys above which idle keys are evicted on `acquire`.
    pub fn with_sweep_threshold(mut self, threshold: usize) -> Self {
        self.sweep_threshold = threshold.max(1);
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn acquire(&self, key: &str) -> Result<()> {
        self.acquire_at(key, Instant::now())
    }

    fn acquire_at(&self, key: &str, now: Instant) -> Result<()> {
        let mut windows = self.windows.lock();
        let window = windows.entry(key.to_string()).or_default();
        prune(window, now, self.window);

        if window.len() >= self.limit {
            let oldest = window.front().copied().unwrap_or(now);
            let retry_after = self.window.saturating_sub(now.saturating_duration_since(oldest));
            warn!(
                key,
                limit = self.limit,
                retry_after_secs = retry_after.as_secs_f64(),
                "rate limit reached"
            );
            return Err(OsintError::RateLimitExceeded {
                key: key.to_string(),
                retry_after,
            });
        }

        window.push_back(now);
        debug!(key, used = window.len(), limit = self.limit, "rate limiter slot taken");

        if windows.len() > self.sweep_threshold {
            sweep_locked(&mut windows, now, self.window);
        }
        Ok(())
    }

    pub fn remaining(&self, key: &str) -> usize {
        self.remaining_at(key, Instant::now())
    }

    fn remaining_at(&self, key: &str, now: Instant) -> usize {
        let windows = self.windows.lock();
        let used = windows
            .get(key)
            .map(|window| {
                window
                    .iter()
                    .filter(|ts| now.saturating_duration_since(**ts) < self.window)
                    .count()
            })
            .unwrap_or(0);
        self.limit.saturating_sub(used)
    }

    /// Drops keys with no requests left in the window. Returns how many were evicted.
    pub fn sweep(&self) -> usize {
        let mut windows = self.windows.lock();
        sweep_locked(&mut windows, Instant::now(), self.window)
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().len()
    }
}

fn prune(window: &mut VecDeque<Instant>, now: Instant, span: Duration) {
    while let Some(oldest) = window.front() {
        if now.saturating_duration_since(*oldest) >= span {
            window.pop_front();
        } else {
            break;
        }
    }
}

fn sweep_locked(
    windows: &mut HashMap<String, VecDeque<Instant>>,
    now: Instant,
    span: Duration,
) -> usize {
    let before = windows.len();
    windows.retain(|_, window| {
        prune(window, now, span);
        !window.is_empty()
    });
    let evicted = before - windows.len();
    if evicted > 0 {
        debug!(evicted, remaining = windows.len(), "evicted idle rate limiter keys");
    }
    evicted
}
