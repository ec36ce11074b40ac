//! Session types: what the server remembers about a connection and
//! about the seats connections leave behind.

use std::time::{Duration, Instant};

use pighouse_protocol::{PlayerId, RoomId};

use crate::{RateLimitConfig, RateLimiter};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long (in seconds) a vacated seat can be reclaimed with its
    /// token.
    ///
    /// Default: 120 seconds. 0 disables reclaiming.
    pub reconnect_grace_secs: u64,

    /// Connections silent for this long are dropped by the sweep.
    ///
    /// Default: 30 minutes.
    pub idle_timeout_secs: u64,

    pub rate_limits: RateLimitConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace_secs: 120,
            idle_timeout_secs: 30 * 60,
            rate_limits: RateLimitConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn reconnect_grace(&self) -> Duration {
        Duration::from_secs(self.reconnect_grace_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Where a connection currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Location {
    #[default]
    Lobby,
    Seated(RoomId),
    Spectating(RoomId),
}

/// One live connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: PlayerId,
    pub location: Location,
    pub last_activity: Instant,
    pub limiter: RateLimiter,
}

// ---------------------------------------------------------------------------
// Seats
// ---------------------------------------------------------------------------

/// Lifecycle of a seat token.
///
/// ```text
///   Occupied ──(connection drops)──→ Vacated ──(grace elapses)──→ Expired
///       ↑                               │
///       └──────────(rejoinRoom)─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatState {
    Occupied,
    Vacated { since: Instant },
    Expired,
}

/// A seat in a room, reachable by its token.
#[derive(Debug, Clone)]
pub struct Seat {
    pub room_id: RoomId,
    /// The identity currently recorded in the room for this seat.
    pub player_id: PlayerId,
    pub state: SeatState,
    /// 32 hex characters, 128 bits of randomness.
    pub token: String,
}
