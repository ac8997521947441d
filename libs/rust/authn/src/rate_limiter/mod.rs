//! Fixed-window rate limiter
//!
//! Bounds how many times a protected operation may run within a window.
//! Used to throttle on-demand JWKS fetches triggered by unknown key IDs.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Rate limit decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request allowed
    Allowed,
    /// Request denied with retry-after duration
    Denied {
        /// Time until the current window closes
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    /// Whether the request was admitted.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

#[derive(Debug)]
struct WindowState {
    window_start: Instant,
    count: u32,
}

/// Fixed-window rate limiter.
///
/// The window resets once strictly more than `window` has elapsed since it
/// opened. A limit of 0 disables limiting.
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    limit: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

impl FixedWindowRateLimiter {
    /// Creates a limiter admitting `limit` requests per `window`.
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(WindowState {
                window_start: Instant::now(),
                count: 0,
            }),
        }
    }

    /// A limiter that admits everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Whether limiting is turned off.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.limit == 0
    }

    /// Checks and, if admitted, counts one request.
    pub fn check(&self) -> RateLimitDecision {
        self.check_at(Instant::now())
    }

    /// Shorthand for `check().is_allowed()`.
    pub fn admit(&self) -> bool {
        self.check().is_allowed()
    }

    /// [`check`](Self::check) against an explicit clock reading.
    pub fn check_at(&self, now: Instant) -> RateLimitDecision {
        if self.is_disabled() {
            return RateLimitDecision::Allowed;
        }

        let mut state = self.state.lock();
        let elapsed = now.saturating_duration_since(state.window_start);
        if elapsed > self.window {
            state.window_start = now;
            state.count = 0;
        }

        if state.count >= self.limit {
            let retry_after = self
                .window
                .saturating_sub(now.saturating_duration_since(state.window_start));
            return RateLimitDecision::Denied { retry_after };
        }

        state.count += 1;
        RateLimitDecision::Allowed
    }
}
