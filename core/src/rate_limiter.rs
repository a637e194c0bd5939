//! Per-user sliding-window quota for live phone lookups.
//!
//! RULES:
//!   - `check` never consumes quota; `increment` is called only after a
//!     live lookup that reached the provider (not cached, skipped or failed).
//!   - State is process-local and resets on restart.

use crate::{config::RateLimitConfig, types::UserId};
use chrono::{DateTime, Duration, Utc};
use log::info;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed:     bool,
    pub retry_after: Duration,
}

impl RateDecision {
    fn allow() -> Self {
        Self {
            allowed:     true,
            retry_after: Duration::zero(),
        }
    }

    /// "2h 15m" style wait, minutes rounded up.
    pub fn retry_after_text(&self) -> String {
        let secs = self.retry_after.num_seconds().max(0);
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60 + 1;
        if hours > 0 {
            format!("{hours}h {minutes}m")
        } else {
            format!("{minutes}m")
        }
    }
}

pub struct RateLimiter {
    enabled:  bool,
    max_uses: usize,
    window:   Duration,
    usage:    Mutex<HashMap<UserId, VecDeque<DateTime<Utc>>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled:  config.enabled,
            max_uses: config.max_lookups,
            window:   Duration::hours(config.window_hours),
            usage:    Mutex::new(HashMap::new()),
        }
    }

    fn purge(window: Duration, stamps: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>) {
        while let Some(oldest) = stamps.front() {
            if now - *oldest >= window {
                stamps.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn check(&self, user_id: UserId, now: DateTime<Utc>) -> RateDecision {
        if !self.enabled {
            return RateDecision::allow();
        }
        let mut usage = match self.usage.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let stamps = usage.entry(user_id).or_default();
        Self::purge(self.window, stamps, now);
        if stamps.len() < self.max_uses {
            return RateDecision::allow();
        }
        let retry_after = stamps
            .front()
            .map(|oldest| self.window - (now - *oldest))
            .unwrap_or_else(Duration::zero);
        RateDecision {
            allowed: false,
            retry_after,
        }
    }

    pub fn increment(&self, user_id: UserId, now: DateTime<Utc>) {
        if !self.enabled {
            return;
        }
        let mut usage = match self.usage.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let stamps = usage.entry(user_id).or_default();
        Self::purge(self.window, stamps, now);
        stamps.push_back(now);
        info!("[RateLimit] user {user_id} lookup count: {}", stamps.len());
    }
}
