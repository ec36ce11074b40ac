//! Connection bookkeeping for Pighouse.
//!
//! This crate tracks the lifecycle around a connection, not the game:
//!
//! 1. **Sessions**: one per live connection, with its location (lobby,
//!    seated, spectating) and last activity ([`SessionManager`])
//! 2. **Rate limiting**: per-connection cooldowns and a chat token
//!    bucket ([`RateLimiter`])
//! 3. **Seat tokens**: secrets that let a new connection reclaim a seat
//!    left behind by a dropped one, within a grace period
//!
//! ```text
//! Gateway (above)  ← asks "may this connection do X?" and "whose seat is this?"
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← PlayerId, RoomId, ErrorCode
//! ```

mod error;
mod limiter;
mod manager;
mod session;

pub use error::SessionError;
pub use limiter::{Action, RateLimitConfig, RateLimiter, TokenBucket};
pub use manager::SessionManager;
pub use session::{Location, Seat, SeatState, Session, SessionConfig};
