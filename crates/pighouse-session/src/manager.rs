//! The session manager: live connections and the seats they hold.
//!
//! # Concurrency note
//!
//! `SessionManager` is a plain struct with `HashMap`s. The server keeps
//! it inside the gateway, behind the single gateway mutex.

use std::collections::HashMap;
use std::time::Instant;

use pighouse_protocol::{PlayerId, RoomId};
use rand::Rng;

use crate::{Action, Location, RateLimiter, Seat, SeatState, Session, SessionConfig, SessionError};

/// Tracks every live connection and every seat token.
///
/// ## Seat lifecycle
///
/// ```text
/// issue_seat() ──→ vacate_seat() ──→ seat_holder() + rebind_seat()
///      │                │
///      │                ▼
///      │          expire_stale() ──→ cleanup_expired()
///      ▼
/// release_seat() / release_room()
/// ```
pub struct SessionManager {
    /// Live connections, keyed by connection identity.
    sessions: HashMap<PlayerId, Session>,

    /// Seat tokens → seats.
    seats: HashMap<String, Seat>,

    /// Connection identity → its seat token. Kept in sync with `seats`.
    seat_tokens: HashMap<PlayerId, String>,

    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            seats: HashMap::new(),
            seat_tokens: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // =====================================================================
    // Connections
    // =====================================================================

    /// Registers a freshly accepted connection, in the lobby.
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if the identity is already live.
    pub fn connect(&mut self, player_id: PlayerId, now: Instant) -> Result<&Session, SessionError> {
        if self.sessions.contains_key(&player_id) {
            return Err(SessionError::AlreadyConnected(player_id));
        }
        let session = Session {
            player_id,
            location: Location::Lobby,
            last_activity: now,
            limiter: RateLimiter::new(self.config.rate_limits.clone(), now),
        };
        tracing::debug!(%player_id, "session created");
        Ok(&*self.sessions.entry(player_id).or_insert(session))
    }

    /// Forgets a connection and vacates its seat, starting the grace
    /// period. Returns the session as it was.
    pub fn disconnect(&mut self, player_id: PlayerId, now: Instant) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .remove(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;
        self.vacate_seat(player_id, now);
        tracing::debug!(%player_id, "session closed");
        Ok(session)
    }

    pub fn get(&self, player_id: &PlayerId) -> Option<&Session> {
        self.sessions.get(player_id)
    }

    /// Where the connection is, or `Lobby` for unknown identities.
    pub fn location(&self, player_id: PlayerId) -> Location {
        self.sessions
            .get(&player_id)
            .map(|s| s.location.clone())
            .unwrap_or_default()
    }

    pub fn set_location(&mut self, player_id: PlayerId, location: Location) {
        if let Some(session) = self.sessions.get_mut(&player_id) {
            session.location = location;
        }
    }

    /// Refreshes a connection's activity clock.
    pub fn touch(&mut self, player_id: PlayerId, now: Instant) {
        if let Some(session) = self.sessions.get_mut(&player_id) {
            session.last_activity = now;
        }
    }

    /// Applies the connection's rate limit for `action`.
    pub fn check_rate(&mut self, player_id: PlayerId, action: Action, now: Instant) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;
        session.limiter.check(action, now).map_err(|retry_after| {
            tracing::warn!(%player_id, %action, ?retry_after, "rate limited");
            SessionError::RateLimited { action, retry_after }
        })
    }

    /// Connections with no activity for longer than the idle timeout.
    pub fn idle(&self, now: Instant) -> Vec<PlayerId> {
        let timeout = self.config.idle_timeout();
        self.sessions
            .values()
            .filter(|s| now.saturating_duration_since(s.last_activity) > timeout)
            .map(|s| s.player_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    // =====================================================================
    // Seats
    // =====================================================================

    /// Creates a seat token for `player_id` in `room_id`, replacing any
    /// token the identity held before.
    pub fn issue_seat(&mut self, player_id: PlayerId, room_id: RoomId) -> String {
        self.release_seat(player_id);
        let token = generate_token();
        self.seats.insert(
            token.clone(),
            Seat {
                room_id,
                player_id,
                state: SeatState::Occupied,
                token: token.clone(),
            },
        );
        self.seat_tokens.insert(player_id, token.clone());
        token
    }

    /// Starts the grace period for `player_id`'s seat, if it has one.
    pub fn vacate_seat(&mut self, player_id: PlayerId, now: Instant) {
        let Some(token) = self.seat_tokens.get(&player_id) else {
            return;
        };
        if let Some(seat) = self.seats.get_mut(token) {
            seat.state = SeatState::Vacated { since: now };
            tracing::debug!(%player_id, room_id = %seat.room_id, "seat vacated, grace period started");
        }
    }

    /// Checks that `token` names a reclaimable seat in `room_id` and
    /// returns the identity recorded for it.
    ///
    /// # Errors
    /// - [`SessionError::InvalidToken`]: unknown token or wrong room
    /// - [`SessionError::AlreadyConnected`]: the seat is still occupied
    /// - [`SessionError::SessionExpired`]: the grace period has elapsed
    pub fn seat_holder(&mut self, token: &str, room_id: &RoomId, now: Instant) -> Result<PlayerId, SessionError> {
        let grace = self.config.reconnect_grace();
        let seat = self.seats.get_mut(token).ok_or(SessionError::InvalidToken)?;
        if seat.room_id != *room_id {
            return Err(SessionError::InvalidToken);
        }
        match seat.state {
            SeatState::Occupied => Err(SessionError::AlreadyConnected(seat.player_id)),
            SeatState::Expired => Err(SessionError::SessionExpired(seat.player_id)),
            SeatState::Vacated { since } => {
                if now.saturating_duration_since(since) > grace {
                    seat.state = SeatState::Expired;
                    return Err(SessionError::SessionExpired(seat.player_id));
                }
                Ok(seat.player_id)
            }
        }
    }

    /// Moves a seat to a new connection after the room accepted the
    /// reclaim. The token stays the same.
    pub fn rebind_seat(&mut self, token: &str, new_id: PlayerId) {
        let Some(seat) = self.seats.get_mut(token) else {
            return;
        };
        let old_id = seat.player_id;
        seat.player_id = new_id;
        seat.state = SeatState::Occupied;
        self.seat_tokens.remove(&old_id);
        self.seat_tokens.insert(new_id, token.to_string());
        tracing::info!(%old_id, %new_id, room_id = %seat.room_id, "seat rebound");
    }

    /// Drops `player_id`'s seat token (explicit leave).
    pub fn release_seat(&mut self, player_id: PlayerId) {
        if let Some(token) = self.seat_tokens.remove(&player_id) {
            self.seats.remove(&token);
        }
    }

    /// Drops every seat token for `room_id` (room deleted).
    pub fn release_room(&mut self, room_id: &RoomId) {
        self.seats.retain(|_, seat| {
            if seat.room_id == *room_id {
                self.seat_tokens.remove(&seat.player_id);
                false
            } else {
                true
            }
        });
    }

    /// Marks vacated seats past the grace period as expired and returns
    /// their identities with the room each one sat in.
    pub fn expire_stale(&mut self, now: Instant) -> Vec<(PlayerId, RoomId)> {
        let grace = self.config.reconnect_grace();
        let mut expired = Vec::new();
        for seat in self.seats.values_mut() {
            if let SeatState::Vacated { since } = seat.state {
                if now.saturating_duration_since(since) > grace {
                    seat.state = SeatState::Expired;
                    expired.push((seat.player_id, seat.room_id.clone()));
                    tracing::info!(player_id = %seat.player_id, room_id = %seat.room_id, "seat expired (grace period elapsed)");
                }
            }
        }
        expired
    }

    /// Removes expired seats, including ones found expired by a late
    /// reclaim, and returns who sat where.
    pub fn cleanup_expired(&mut self) -> Vec<(PlayerId, RoomId)> {
        let mut removed = Vec::new();
        self.seats.retain(|_, seat| {
            if seat.state == SeatState::Expired {
                self.seat_tokens.remove(&seat.player_id);
                removed.push((seat.player_id, seat.room_id.clone()));
                false
            } else {
                true
            }
        });
        removed
    }

    /// Whether `player_id` still has a seat token.
    pub fn holds_seat(&self, player_id: PlayerId) -> bool {
        self.seat_tokens.contains_key(&player_id)
    }

    pub fn seat(&self, token: &str) -> Option<&Seat> {
        self.seats.get(token)
    }

    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
