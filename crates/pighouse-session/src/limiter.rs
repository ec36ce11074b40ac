//! Per-connection rate limiting.
//!
//! Room creation and joining use plain cooldowns. Chat uses a token
//! bucket so a short burst is fine but a flood is not. Every check takes
//! `now` explicitly so tests can move the clock.

use std::fmt;
use std::time::{Duration, Instant};

/// A rate-limited kind of request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateRoom,
    /// Shared by join, spectate, and rejoin.
    JoinRoom,
    Chat,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateRoom => write!(f, "create room"),
            Self::JoinRoom => write!(f, "join room"),
            Self::Chat => write!(f, "chat"),
        }
    }
}

/// Limits applied to every connection.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub create_cooldown: Duration,
    pub join_cooldown: Duration,
    /// Messages allowed in a burst.
    pub chat_burst: u32,
    /// Time for a drained bucket to refill completely.
    pub chat_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            create_cooldown: Duration::from_secs(5),
            join_cooldown: Duration::from_secs(3),
            chat_burst: 5,
            chat_window: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// TokenBucket
// ---------------------------------------------------------------------------

/// Classic token bucket: `capacity` tokens, refilled continuously so an
/// empty bucket is full again after `window`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, window: Duration, now: Instant) -> Self {
        let capacity = f64::from(capacity.max(1));
        let window = window.as_secs_f64().max(f64::EPSILON);
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: capacity / window,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Takes one token, or reports how long until one is available.
    pub fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_per_sec))
        }
    }
}

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

/// The limits for one connection.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    last_create: Option<Instant>,
    last_join: Option<Instant>,
    chat: TokenBucket,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, now: Instant) -> Self {
        let chat = TokenBucket::new(config.chat_burst, config.chat_window, now);
        Self {
            config,
            last_create: None,
            last_join: None,
            chat,
        }
    }

    /// Records an attempt at `action`.
    ///
    /// Rejected attempts don't count against the limit. On rejection the
    /// error holds the time left before the action is allowed again.
    pub fn check(&mut self, action: Action, now: Instant) -> Result<(), Duration> {
        match action {
            Action::CreateRoom => cooldown(&mut self.last_create, self.config.create_cooldown, now),
            Action::JoinRoom => cooldown(&mut self.last_join, self.config.join_cooldown, now),
            Action::Chat => self.chat.try_take(now),
        }
    }
}

fn cooldown(last: &mut Option<Instant>, period: Duration, now: Instant) -> Result<(), Duration> {
    if let Some(prev) = *last {
        let elapsed = now.saturating_duration_since(prev);
        if elapsed < period {
            return Err(period - elapsed);
        }
    }
    *last = Some(now);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_check_create_within_cooldown_rejected() {
        let t0 = Instant::now();
        let mut limiter = RateLimiter::new(RateLimitConfig::default(), t0);
        assert!(limiter.check(Action::CreateRoom, t0).is_ok());
        let retry = limiter.check(Action::CreateRoom, t0 + secs(2)).unwrap_err();
        assert_eq!(retry, secs(3));
        assert!(limiter.check(Action::CreateRoom, t0 + secs(5)).is_ok());
    }

    #[test]
    fn test_check_rejected_attempt_does_not_reset_cooldown() {
        let t0 = Instant::now();
        let mut limiter = RateLimiter::new(RateLimitConfig::default(), t0);
        limiter.check(Action::JoinRoom, t0).unwrap();
        assert!(limiter.check(Action::JoinRoom, t0 + secs(2)).is_err());
        assert!(limiter.check(Action::JoinRoom, t0 + secs(3)).is_ok());
    }

    #[test]
    fn test_check_actions_limited_independently() {
        let t0 = Instant::now();
        let mut limiter = RateLimiter::new(RateLimitConfig::default(), t0);
        limiter.check(Action::CreateRoom, t0).unwrap();
        assert!(limiter.check(Action::JoinRoom, t0).is_ok());
        assert!(limiter.check(Action::Chat, t0).is_ok());
    }

    #[test]
    fn test_check_chat_burst_of_five_then_limited() {
        let t0 = Instant::now();
        let mut limiter = RateLimiter::new(RateLimitConfig::default(), t0);
        for _ in 0..5 {
            assert!(limiter.check(Action::Chat, t0).is_ok());
        }
        let retry = limiter.check(Action::Chat, t0).unwrap_err();
        assert_eq!(retry, secs(2));
        // one token back every two seconds
        assert!(limiter.check(Action::Chat, t0 + secs(2)).is_ok());
        assert!(limiter.check(Action::Chat, t0 + secs(2)).is_err());
    }

    #[test]
    fn test_token_bucket_never_exceeds_capacity() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(2, secs(10), t0);
        let later = t0 + secs(3600);
        assert!(bucket.try_take(later).is_ok());
        assert!(bucket.try_take(later).is_ok());
        assert!(bucket.try_take(later).is_err());
    }
}
