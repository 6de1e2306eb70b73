//! Per-session sliding-window admission control.

use crate::session::SessionId;
use dashmap::DashMap;
use std::collections::VecDeque;
use tracing::trace;

/// Default number of messages admitted per window.
pub const DEFAULT_MAX_MESSAGES: usize = 5;

/// Default window length in milliseconds.
pub const DEFAULT_WINDOW_MS: u64 = 1000;

/// Rate limiter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Admissions allowed in any trailing window.
    pub max_messages: usize,
    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Throttled,
}

impl Admission {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        self == Admission::Allowed
    }
}

/// Sliding-window rate limiter keyed by session.
///
/// Each session keeps the timestamps of its admitted messages, oldest first.
/// A timestamp `t` counts against the window while `now - t < window_ms`.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<SessionId, VecDeque<u64>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Check whether `session_id` may send a message at `now` (milliseconds).
    ///
    /// Allowed admissions record `now`. Throttled checks leave the stored
    /// sequence untouched.
    pub fn admit(&self, session_id: &str, now: u64) -> Admission {
        let mut stamps = self.windows.entry(session_id.to_string()).or_default();

        let window = self.config.window_ms;
        let stale = stamps
            .iter()
            .position(|&t| now.saturating_sub(t) < window)
            .unwrap_or(stamps.len());

        if stamps.len() - stale >= self.config.max_messages {
            trace!(session = %session_id, "Throttled");
            return Admission::Throttled;
        }

        stamps.drain(..stale);
        stamps.push_back(now);
        Admission::Allowed
    }

    /// Drop all state for a session.
    pub fn forget(&self, session_id: &str) {
        self.windows.remove(session_id);
    }

    /// Number of admissions currently recorded for a session.
    #[must_use]
    pub fn recorded(&self, session_id: &str) -> usize {
        self.windows.get(session_id).map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
