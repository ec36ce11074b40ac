//! Room registry: creates rooms, seats players, and tracks who is where.

use std::collections::HashMap;
use std::time::Duration;

use pighouse_protocol::{Card, GameState, OngoingGame, PlayerId, RoomId, RoomSummary};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{GameConfig, GameError, Player, Room, Spectator};

/// Alphabet for generated room codes.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of generated room codes.
pub const CODE_LEN: usize = 6;

/// A room that was deleted, and who was still attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedRoom {
    pub room_id: RoomId,
    /// Connected players and spectators at the moment of deletion.
    pub audience: Vec<PlayerId>,
}

/// How someone stopped being part of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepartureKind {
    /// The seat was removed. `hand` holds the cards it had.
    Left { seat: usize, hand: Vec<Card> },
    /// The seat stays, marked disconnected.
    Disconnected { seat: usize },
    /// A spectator went away.
    Spectator,
}

/// What [`RoomRegistry::leave`] and [`RoomRegistry::disconnect`] changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub kind: DepartureKind,
    /// State of the room when the departure happened.
    pub state: GameState,
    /// Set when the host moved to someone else.
    pub new_host: Option<PlayerId>,
    /// Set when the departure emptied the room and it was deleted.
    pub closed: Option<ClosedRoom>,
}

impl Departure {
    /// The seat index vacated, for seat departures.
    pub fn seat(&self) -> Option<usize> {
        match self.kind {
            DepartureKind::Left { seat, .. } | DepartureKind::Disconnected { seat } => Some(seat),
            DepartureKind::Spectator => None,
        }
    }
}

/// Owns every room and the player → room index.
///
/// A connection is in at most one room at a time, as a player or as a
/// spectator. The index only holds connected identities; a disconnected
/// seat is reachable through its room.
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
    player_rooms: HashMap<PlayerId, RoomId>,
    rng: StdRng,
    config: GameConfig,
}

impl RoomRegistry {
    /// Creates an empty registry seeded from the OS.
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Creates an empty registry with deterministic room codes.
    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, rng: StdRng) -> Self {
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            rng,
            config: config.validated(),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    // -- Lookup -----------------------------------------------------------

    pub fn room(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn room_mut(&mut self, room_id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    /// The room a connection is attached to, if any.
    pub fn room_of(&self, player_id: PlayerId) -> Option<&RoomId> {
        self.player_rooms.get(&player_id)
    }

    pub fn room_of_mut(&mut self, player_id: PlayerId) -> Option<&mut Room> {
        let room_id = self.player_rooms.get(&player_id)?;
        self.rooms.get_mut(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    // -- Membership -------------------------------------------------------

    /// Creates a room with `host_id` as its only player.
    ///
    /// # Errors
    /// [`GameError::AlreadyInRoom`] if the host is attached elsewhere.
    pub fn create_room(
        &mut self,
        host_id: PlayerId,
        host_name: &str,
        password: Option<String>,
    ) -> Result<&Room, GameError> {
        self.ensure_unattached(host_id)?;

        let room_id = self.generate_unique_code();
        let room = Room::new(
            room_id.clone(),
            Player::new(host_id, host_name),
            password,
            self.config.max_rounds,
            self.config.chat_history,
        );
        self.player_rooms.insert(host_id, room_id.clone());
        tracing::info!(%room_id, %host_id, "room created");
        Ok(&*self.rooms.entry(room_id).or_insert(room))
    }

    /// Seats `player_id` in an existing room.
    ///
    /// Checks run in a fixed order: not found, wrong password, full,
    /// already started, duplicate name.
    pub fn join_room(
        &mut self,
        room_id: &RoomId,
        player_id: PlayerId,
        name: &str,
        password: &str,
    ) -> Result<&Room, GameError> {
        self.ensure_unattached(player_id)?;
        let max_players = self.config.max_players;

        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| GameError::RoomNotFound(room_id.clone()))?;
        if room.password.as_deref().is_some_and(|p| p != password) {
            return Err(GameError::InvalidPassword(room_id.clone()));
        }
        if room.players.len() >= max_players {
            return Err(GameError::RoomFull(room_id.clone()));
        }
        if !room.state.is_joinable() {
            return Err(GameError::GameAlreadyStarted(room_id.clone()));
        }
        if room.name_taken(name) {
            return Err(GameError::DuplicateName(name.to_string()));
        }

        room.players.push(Player::new(player_id, name));
        room.touch();
        self.player_rooms.insert(player_id, room_id.clone());
        tracing::info!(%room_id, %player_id, players = room.players.len(), "player joined");
        Ok(&*room)
    }

    /// Attaches `player_id` to a game in progress as a spectator.
    pub fn spectate(
        &mut self,
        room_id: &RoomId,
        player_id: PlayerId,
        name: &str,
    ) -> Result<&Room, GameError> {
        self.ensure_unattached(player_id)?;

        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| GameError::RoomNotFound(room_id.clone()))?;
        if room.state != GameState::Playing {
            return Err(GameError::NotPlaying(room_id.clone()));
        }

        room.spectators.push(Spectator {
            id: player_id,
            name: name.to_string(),
        });
        room.touch();
        self.player_rooms.insert(player_id, room_id.clone());
        tracing::info!(%room_id, %player_id, "spectator joined");
        Ok(&*room)
    }

    /// Removes a player's seat (or a spectator) entirely.
    ///
    /// Returns `None` if the connection was not in a room. The host moves
    /// to the first connected player if the host left. The room is
    /// deleted once no connected player remains.
    pub fn leave(&mut self, player_id: PlayerId) -> Option<Departure> {
        let room_id = self.player_rooms.remove(&player_id)?;
        let room = self.rooms.get_mut(&room_id)?;
        let state = room.state;

        let kind = match room.seat_of(player_id) {
            Some(seat) => {
                let player = room.players.remove(seat);
                DepartureKind::Left {
                    seat,
                    hand: player.hand,
                }
            }
            None => {
                room.spectators.retain(|s| s.id != player_id);
                DepartureKind::Spectator
            }
        };
        room.touch();
        tracing::info!(%room_id, %player_id, "left room");

        let new_host = if room.host_id == player_id {
            reassign_host(room)
        } else {
            None
        };

        let closed = self.close_if_empty(&room_id);
        Some(Departure {
            room_id,
            player_id,
            kind,
            state,
            new_host,
            closed,
        })
    }

    /// Marks a player's seat disconnected, or drops a spectator.
    ///
    /// Idempotent: the identity leaves the index on the first call, so
    /// repeats return `None`. The host only moves while the room is
    /// waiting.
    pub fn disconnect(&mut self, player_id: PlayerId) -> Option<Departure> {
        let room_id = self.player_rooms.remove(&player_id)?;
        let room = self.rooms.get_mut(&room_id)?;
        let state = room.state;

        let kind = match room.seat_of(player_id) {
            Some(seat) => {
                room.players[seat].connected = false;
                DepartureKind::Disconnected { seat }
            }
            None => {
                room.spectators.retain(|s| s.id != player_id);
                DepartureKind::Spectator
            }
        };
        room.touch();
        tracing::info!(%room_id, %player_id, "disconnected from room");

        let new_host = if room.host_id == player_id && state == GameState::Waiting {
            reassign_host(room)
        } else {
            None
        };

        let closed = self.close_if_empty(&room_id);
        Some(Departure {
            room_id,
            player_id,
            kind,
            state,
            new_host,
            closed,
        })
    }

    /// Hands a disconnected seat to a new connection.
    ///
    /// Role, hand, host and key-holder status all carry over to
    /// `new_id`. A seat that was dropped before the deal has no role and
    /// cannot come back until the room is waiting again.
    ///
    /// # Errors
    /// - [`GameError::SeatOccupied`]: the seat is still connected
    /// - [`GameError::GameAlreadyStarted`]: the game started without it
    pub fn reclaim_seat(
        &mut self,
        room_id: &RoomId,
        old_id: PlayerId,
        new_id: PlayerId,
    ) -> Result<&Room, GameError> {
        self.ensure_unattached(new_id)?;

        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| GameError::RoomNotFound(room_id.clone()))?;
        let state = room.state;
        let player = room
            .player_mut(old_id)
            .ok_or(GameError::PlayerNotFound(old_id))?;
        if player.connected {
            return Err(GameError::SeatOccupied(old_id));
        }
        if player.role.is_none() && state != GameState::Waiting {
            return Err(GameError::GameAlreadyStarted(room_id.clone()));
        }
        player.id = new_id;
        player.connected = true;

        if room.host_id == old_id {
            room.host_id = new_id;
        }
        if room.progress.key_holder == Some(old_id) {
            room.progress.key_holder = Some(new_id);
        }
        room.touch();
        self.player_rooms.insert(new_id, room_id.clone());
        tracing::info!(%room_id, %old_id, %new_id, "seat reclaimed");
        Ok(&*room)
    }

    /// Removes a disconnected seat for good, once nobody can reclaim it.
    ///
    /// Only applies outside a game in progress: a started game keeps the
    /// seat until it finishes. Returns `None` if there was nothing to
    /// remove.
    pub fn drop_vacant_seat(&mut self, room_id: &RoomId, player_id: PlayerId) -> Option<Departure> {
        let room = self.rooms.get_mut(room_id)?;
        let state = room.state;
        if state == GameState::Playing {
            return None;
        }
        let seat = room.seat_of(player_id)?;
        if room.players[seat].connected {
            return None;
        }
        let player = room.players.remove(seat);
        tracing::info!(%room_id, %player_id, "vacant seat dropped");

        let new_host = if room.host_id == player_id {
            reassign_host(room)
        } else {
            None
        };
        let closed = self.close_if_empty(room_id);
        Some(Departure {
            room_id: room_id.clone(),
            player_id,
            kind: DepartureKind::Left {
                seat,
                hand: player.hand,
            },
            state,
            new_host,
            closed,
        })
    }

    // -- Lobby views ------------------------------------------------------

    /// Rooms still waiting for players, ordered by code.
    pub fn list_open_rooms(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<RoomSummary> = self
            .rooms
            .values()
            .filter(|r| r.state == GameState::Waiting)
            .map(Room::summary)
            .collect();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        rooms
    }

    /// Games in progress, ordered by code.
    pub fn list_ongoing_games(&self) -> Vec<OngoingGame> {
        let mut games: Vec<OngoingGame> = self
            .rooms
            .values()
            .filter(|r| r.state == GameState::Playing)
            .map(Room::ongoing)
            .collect();
        games.sort_by(|a, b| a.id.cmp(&b.id));
        games
    }

    // -- Maintenance ------------------------------------------------------

    /// Deletes every room idle for at least `max_idle`.
    pub fn sweep_inactive(&mut self, max_idle: Duration) -> Vec<ClosedRoom> {
        let stale: Vec<RoomId> = self
            .rooms
            .values()
            .filter(|r| r.last_activity.elapsed() >= max_idle)
            .map(|r| r.id.clone())
            .collect();

        stale
            .into_iter()
            .filter_map(|room_id| {
                let room = self.rooms.remove(&room_id)?;
                self.player_rooms.retain(|_, rid| *rid != room_id);
                tracing::info!(%room_id, "room evicted after inactivity");
                Some(ClosedRoom {
                    audience: room.audience(),
                    room_id,
                })
            })
            .collect()
    }

    // -- Internals --------------------------------------------------------

    fn ensure_unattached(&self, player_id: PlayerId) -> Result<(), GameError> {
        match self.player_rooms.get(&player_id) {
            Some(current) => Err(GameError::AlreadyInRoom(player_id, current.clone())),
            None => Ok(()),
        }
    }

    fn close_if_empty(&mut self, room_id: &RoomId) -> Option<ClosedRoom> {
        if self.rooms.get(room_id)?.connected_count() > 0 {
            return None;
        }
        let room = self.rooms.remove(room_id)?;
        self.player_rooms.retain(|_, rid| rid != room_id);
        tracing::info!(%room_id, "room destroyed");
        Some(ClosedRoom {
            room_id: room.id.clone(),
            audience: room.audience(),
        })
    }

    fn generate_unique_code(&mut self) -> RoomId {
        loop {
            let code: String = (0..CODE_LEN)
                .map(|_| CODE_ALPHABET[self.rng.random_range(0..CODE_ALPHABET.len())] as char)
                .collect();
            let room_id = RoomId(code);
            if !self.rooms.contains_key(&room_id) {
                return room_id;
            }
        }
    }
}

/// Moves the host to the first connected seat. Returns the new host if
/// it changed.
fn reassign_host(room: &mut Room) -> Option<PlayerId> {
    let next = room.first_connected()?;
    if next == room.host_id {
        return None;
    }
    room.host_id = next;
    tracing::info!(room_id = %room.id, new_host = %next, "host reassigned");
    Some(next)
}
