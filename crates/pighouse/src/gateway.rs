//! The session gateway: turns client intents into registry and engine
//! calls, and their results into outbound events.
//!
//! The gateway is synchronous. Every connection owns an unbounded
//! `mpsc` receiver; the gateway only ever pushes onto the matching
//! senders, so a slow socket never holds up a room.
//!
//! ```text
//! ClientMessage ──→ validate ──→ rate limit ──→ registry / engine
//!                                                   │
//!              (Recipient, ServerMessage) ←─────────┘
//!                        │
//!                    dispatch ──→ per-connection senders
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use pighouse_game::{Departure, GameConfig, GameError, RoomRegistry, RoundEngine, TurnOutcome};
use pighouse_protocol::{
    ChatEntry, ClientMessage, ErrorCode, GameData, PlayerId, ProtocolError, Recipient, RoomId,
    ServerMessage,
};
use pighouse_session::{Action, Location, SessionConfig, SessionManager};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

use crate::PighouseError;
use crate::validate::{
    ValidationError, join_password, normalize_room_id, room_password, validate_chat, validate_name,
};

/// Outbound half of a connection, as seen by the gateway.
pub type Outbound = UnboundedSender<ServerMessage>;

type Batch = Vec<(Recipient, ServerMessage)>;

/// What one maintenance pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub idle_connections: usize,
    pub expired_seats: usize,
    pub closed_rooms: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.idle_connections == 0 && self.expired_seats == 0 && self.closed_rooms == 0
    }
}

/// Owns all game and session state for one server.
pub struct Gateway {
    registry: RoomRegistry,
    engine: RoundEngine,
    sessions: SessionManager,
    outbound: HashMap<PlayerId, Outbound>,
    started: Instant,
}

impl Gateway {
    pub fn new(game: GameConfig, session: SessionConfig) -> Self {
        Self::from_parts(
            RoomRegistry::new(game.clone()),
            RoundEngine::new(game),
            session,
        )
    }

    /// Deterministic room codes and deals, for tests.
    pub fn with_seed(game: GameConfig, session: SessionConfig, seed: u64) -> Self {
        Self::from_parts(
            RoomRegistry::with_seed(game.clone(), seed),
            RoundEngine::with_seed(game, seed.wrapping_add(1)),
            session,
        )
    }

    fn from_parts(registry: RoomRegistry, engine: RoundEngine, session: SessionConfig) -> Self {
        Self {
            registry,
            engine,
            sessions: SessionManager::new(session),
            outbound: HashMap::new(),
            started: Instant::now(),
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.outbound.len()
    }

    // =====================================================================
    // Connection lifecycle
    // =====================================================================

    /// Registers a new connection and greets it with `connected`.
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`](pighouse_session::SessionError)
    /// if `player_id` is already live.
    pub fn connect(&mut self, player_id: PlayerId, outbound: Outbound) -> Result<(), PighouseError> {
        self.sessions.connect(player_id, Instant::now())?;
        self.outbound.insert(player_id, outbound);
        self.send(player_id, ServerMessage::Connected { player_id });
        Ok(())
    }

    /// Handles a transport-level disconnect. Safe to call more than once.
    pub fn disconnect(&mut self, player_id: PlayerId) {
        self.disconnect_at(player_id, Instant::now());
    }

    fn disconnect_at(&mut self, player_id: PlayerId, now: Instant) {
        self.outbound.remove(&player_id);
        if self.sessions.disconnect(player_id, now).is_err() {
            debug!(%player_id, "disconnect for unknown session");
        }
        if let Some(departure) = self.registry.disconnect(player_id) {
            self.after_departure(departure);
            self.dispatch(self.lobby_batch());
        }
    }

    /// Answers a frame that could not be decoded.
    pub fn reject_frame(&mut self, player_id: PlayerId, err: &ProtocolError) {
        debug!(%player_id, error = %err, "malformed frame");
        self.send(
            player_id,
            ServerMessage::Error {
                code: ErrorCode::ValidationError,
                message: err.to_string(),
            },
        );
    }

    /// Handles one intent to completion. Failures go back to the actor
    /// only, as an `error` event.
    pub fn handle(&mut self, player_id: PlayerId, msg: ClientMessage) {
        self.handle_at(player_id, msg, Instant::now());
    }

    /// [`handle`](Self::handle) with an explicit clock, for rate-limit
    /// tests.
    pub fn handle_at(&mut self, player_id: PlayerId, msg: ClientMessage, now: Instant) {
        let kind = msg.kind();
        if let Err(e) = self.process(player_id, msg, now) {
            let code = e.code();
            if code == ErrorCode::ServerError {
                error!(%player_id, intent = kind, error = %e, "intent failed");
            } else {
                debug!(%player_id, intent = kind, %code, error = %e, "intent rejected");
            }
            self.send(
                player_id,
                ServerMessage::Error {
                    code,
                    message: e.to_string(),
                },
            );
        }
    }

    /// One maintenance pass: drops idle connections, expires seat tokens
    /// past their grace period, and evicts rooms idle for `room_idle`.
    /// A seat whose token expired is removed from its room unless a game
    /// is in progress there.
    ///
    /// Dropping a connection's sender ends its connection task.
    pub fn sweep(&mut self, now: Instant, room_idle: Duration) -> SweepReport {
        let idle = self.sessions.idle(now);
        for &player_id in &idle {
            info!(%player_id, "dropping idle connection");
            self.disconnect_at(player_id, now);
        }

        let expired = self.sessions.expire_stale(now);
        let mut seats_dropped = false;
        for (player_id, room_id) in self.sessions.cleanup_expired() {
            if let Some(departure) = self.registry.drop_vacant_seat(&room_id, player_id) {
                seats_dropped = true;
                self.after_departure(departure);
            }
        }

        let closed = self.registry.sweep_inactive(room_idle);
        for room in &closed {
            self.sessions.release_room(&room.room_id);
            for &member in &room.audience {
                self.sessions.set_location(member, Location::Lobby);
                self.send(
                    member,
                    ServerMessage::RoomClosed {
                        room_id: room.room_id.clone(),
                    },
                );
            }
        }
        if seats_dropped || !closed.is_empty() {
            self.dispatch(self.lobby_batch());
        }

        SweepReport {
            idle_connections: idle.len(),
            expired_seats: expired.len(),
            closed_rooms: closed.len(),
        }
    }

    // =====================================================================
    // Intents
    // =====================================================================

    fn process(&mut self, player_id: PlayerId, msg: ClientMessage, now: Instant) -> Result<(), PighouseError> {
        self.sessions.touch(player_id, now);
        match msg {
            ClientMessage::CreateRoom {
                player_name,
                has_password,
                password,
            } => self.create_room(player_id, &player_name, has_password, &password, now),
            ClientMessage::JoinRoom {
                room_id,
                player_name,
                password,
            } => self.join_room(player_id, &room_id, &player_name, &password, now),
            ClientMessage::RejoinRoom {
                room_id,
                session_token,
            } => self.rejoin_room(player_id, &room_id, &session_token, now),
            ClientMessage::SpectateRoom {
                room_id,
                spectator_name,
            } => self.spectate_room(player_id, &room_id, &spectator_name, now),
            ClientMessage::LeaveRoom => {
                if self.leave_current(player_id) {
                    Ok(())
                } else {
                    Err(ValidationError::NotInRoom.into())
                }
            }
            ClientMessage::StartGame => self.start_game(player_id),
            ClientMessage::SelectCard {
                target_player_id,
                card_index,
            } => self.select_card(player_id, target_player_id, card_index),
            ClientMessage::SendChat { text } => self.send_chat(player_id, &text, now),
            ClientMessage::RestartGame => self.restart_game(player_id),
            ClientMessage::GetRoomList => {
                let rooms = self.registry.list_open_rooms();
                self.send(player_id, ServerMessage::RoomList { rooms });
                Ok(())
            }
            ClientMessage::GetOngoingGames => {
                let games = self.registry.list_ongoing_games();
                self.send(player_id, ServerMessage::OngoingGames { games });
                Ok(())
            }
            ClientMessage::Heartbeat { client_time } => {
                let server_time = self.server_time();
                self.send(
                    player_id,
                    ServerMessage::HeartbeatAck {
                        client_time,
                        server_time,
                    },
                );
                Ok(())
            }
        }
    }

    fn create_room(
        &mut self,
        player_id: PlayerId,
        player_name: &str,
        has_password: bool,
        password: &str,
        now: Instant,
    ) -> Result<(), PighouseError> {
        let name = validate_name(player_name)?;
        let password = room_password(has_password, password)?;
        self.sessions.check_rate(player_id, Action::CreateRoom, now)?;
        self.leave_current(player_id);

        let room = self.registry.create_room(player_id, &name, password)?;
        let room_id = room.id.clone();
        let game_data = room.game_data();
        let session_token = self.sessions.issue_seat(player_id, room_id.clone());
        self.sessions
            .set_location(player_id, Location::Seated(room_id.clone()));

        let mut batch = vec![(
            Recipient::Player(player_id),
            ServerMessage::RoomCreated {
                room_id,
                game_data,
                is_host: true,
                session_token,
            },
        )];
        batch.extend(self.lobby_batch());
        self.dispatch(batch);
        Ok(())
    }

    fn join_room(
        &mut self,
        player_id: PlayerId,
        room_id: &str,
        player_name: &str,
        password: &str,
        now: Instant,
    ) -> Result<(), PighouseError> {
        let room_id = normalize_room_id(room_id)?;
        let name = validate_name(player_name)?;
        let password = join_password(password)?;
        self.sessions.check_rate(player_id, Action::JoinRoom, now)?;
        self.leave_current(player_id);

        let room = self.registry.join_room(&room_id, player_id, &name, password)?;
        let game_data = room.game_data();
        let is_host = room.host_id == player_id;
        let session_token = self.sessions.issue_seat(player_id, room_id.clone());
        self.sessions
            .set_location(player_id, Location::Seated(room_id.clone()));

        let mut batch = vec![
            (
                Recipient::Player(player_id),
                ServerMessage::RoomJoined {
                    room_id: room_id.clone(),
                    game_data: game_data.clone(),
                    is_host,
                    session_token,
                },
            ),
            (Recipient::Room(room_id), ServerMessage::GameUpdate { game_data }),
        ];
        batch.extend(self.lobby_batch());
        self.dispatch(batch);
        Ok(())
    }

    fn rejoin_room(
        &mut self,
        player_id: PlayerId,
        room_id: &str,
        session_token: &str,
        now: Instant,
    ) -> Result<(), PighouseError> {
        let room_id = normalize_room_id(room_id)?;
        self.sessions.check_rate(player_id, Action::JoinRoom, now)?;
        let old_id = self.sessions.seat_holder(session_token, &room_id, now)?;
        self.leave_current(player_id);

        let room = self.registry.reclaim_seat(&room_id, old_id, player_id)?;
        let game_data = room.game_data();
        let is_host = room.host_id == player_id;
        self.sessions.rebind_seat(session_token, player_id);
        self.sessions
            .set_location(player_id, Location::Seated(room_id.clone()));
        info!(%room_id, %old_id, %player_id, "player rejoined");

        let mut batch = vec![
            (
                Recipient::Player(player_id),
                ServerMessage::RoomJoined {
                    room_id: room_id.clone(),
                    game_data: game_data.clone(),
                    is_host,
                    session_token: session_token.to_string(),
                },
            ),
            (Recipient::Room(room_id), ServerMessage::GameUpdate { game_data }),
        ];
        batch.extend(self.lobby_batch());
        self.dispatch(batch);
        Ok(())
    }

    fn spectate_room(
        &mut self,
        player_id: PlayerId,
        room_id: &str,
        spectator_name: &str,
        now: Instant,
    ) -> Result<(), PighouseError> {
        let room_id = normalize_room_id(room_id)?;
        let name = validate_name(spectator_name)?;
        self.sessions.check_rate(player_id, Action::JoinRoom, now)?;
        self.leave_current(player_id);

        let room = self.registry.spectate(&room_id, player_id, &name)?;
        let game_data = room.game_data();
        self.sessions
            .set_location(player_id, Location::Spectating(room_id.clone()));

        let mut batch = vec![
            (
                Recipient::Player(player_id),
                ServerMessage::SpectateSuccess {
                    room_id: room_id.clone(),
                    game_data: game_data.clone(),
                },
            ),
            (Recipient::Room(room_id), ServerMessage::GameUpdate { game_data }),
        ];
        batch.extend(self.lobby_batch());
        self.dispatch(batch);
        Ok(())
    }

    /// Explicit leave. Returns `false` if the connection was not in a room.
    fn leave_current(&mut self, player_id: PlayerId) -> bool {
        let Some(departure) = self.registry.leave(player_id) else {
            return false;
        };
        self.sessions.release_seat(player_id);
        self.sessions.set_location(player_id, Location::Lobby);

        let room_id = departure.room_id.clone();
        self.after_departure(departure);

        let mut batch = vec![(Recipient::Player(player_id), ServerMessage::LeftRoom { room_id })];
        batch.extend(self.lobby_batch());
        self.dispatch(batch);
        true
    }

    fn start_game(&mut self, player_id: PlayerId) -> Result<(), PighouseError> {
        let room = self
            .registry
            .room_of_mut(player_id)
            .ok_or(ValidationError::NotInRoom)?;
        self.engine.start_game(room, player_id)?;

        let room_id = room.id.clone();
        let game_data = room.game_data();
        let mut batch = vec![
            (Recipient::Room(room_id.clone()), ServerMessage::GameUpdate { game_data }),
            (Recipient::Room(room_id), ServerMessage::RoundStart { round: 1 }),
        ];
        batch.extend(self.lobby_batch());
        self.dispatch(batch);
        Ok(())
    }

    fn select_card(
        &mut self,
        player_id: PlayerId,
        target: PlayerId,
        card_index: usize,
    ) -> Result<(), PighouseError> {
        let room = self
            .registry
            .room_of_mut(player_id)
            .ok_or(GameError::PlayerNotFound(player_id))?;
        let outcome = self
            .engine
            .select_card(room, player_id, target, card_index)?;

        let room_id = room.id.clone();
        let game_data = room.game_data();
        let mut batch = room_update(room_id, game_data, outcome);
        batch.extend(self.lobby_batch());
        self.dispatch(batch);
        Ok(())
    }

    fn send_chat(&mut self, player_id: PlayerId, text: &str, now: Instant) -> Result<(), PighouseError> {
        let text = validate_chat(text)?;
        let seated = self
            .registry
            .room_of(player_id)
            .and_then(|room_id| self.registry.room(room_id))
            .map(|room| room.player(player_id).is_some());
        match seated {
            None => return Err(ValidationError::NotInRoom.into()),
            Some(false) => return Err(ValidationError::NotSeated.into()),
            Some(true) => {}
        }
        self.sessions.check_rate(player_id, Action::Chat, now)?;

        let timestamp = self.server_time();
        let room = self
            .registry
            .room_of_mut(player_id)
            .ok_or(ValidationError::NotInRoom)?;
        let player_name = room
            .player(player_id)
            .map(|p| p.name.clone())
            .ok_or(ValidationError::NotSeated)?;
        room.chat.push(ChatEntry {
            player_id,
            player_name,
            text,
            timestamp,
        });
        room.touch();

        let room_id = room.id.clone();
        let history = room.chat.history();
        self.dispatch(vec![(Recipient::Room(room_id), ServerMessage::NewMessage { history })]);
        Ok(())
    }

    fn restart_game(&mut self, player_id: PlayerId) -> Result<(), PighouseError> {
        let room = self
            .registry
            .room_of_mut(player_id)
            .ok_or(ValidationError::NotInRoom)?;
        self.engine.restart(room, player_id)?;

        // seats whose token lapsed during the game can never come back
        let room_id = room.id.clone();
        let lapsed: Vec<PlayerId> = room
            .players
            .iter()
            .filter(|p| !p.connected && !self.sessions.holds_seat(p.id))
            .map(|p| p.id)
            .collect();
        for id in lapsed {
            self.registry.drop_vacant_seat(&room_id, id);
        }

        let game_data = self
            .registry
            .room(&room_id)
            .ok_or_else(|| GameError::RoomNotFound(room_id.clone()))?
            .game_data();
        let mut batch = vec![(Recipient::Room(room_id), ServerMessage::GameUpdate { game_data })];
        batch.extend(self.lobby_batch());
        self.dispatch(batch);
        Ok(())
    }

    // =====================================================================
    // Fan-out
    // =====================================================================

    /// Repairs the room after someone left it, then tells whoever is
    /// still there. A deleted room only gets `roomClosed` to its
    /// remaining audience.
    fn after_departure(&mut self, departure: Departure) {
        if let Some(closed) = &departure.closed {
            self.sessions.release_room(&closed.room_id);
            for &member in &closed.audience {
                self.sessions.set_location(member, Location::Lobby);
                self.send(
                    member,
                    ServerMessage::RoomClosed {
                        room_id: closed.room_id.clone(),
                    },
                );
            }
            return;
        }

        let Some(room) = self.registry.room_mut(&departure.room_id) else {
            return;
        };
        let outcome = match self.engine.handle_departure(room, &departure) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(room_id = %departure.room_id, error = %e, "departure repair failed");
                TurnOutcome::default()
            }
        };

        let mut batch = Vec::new();
        if let Some(new_host_id) = departure.new_host {
            batch.push((
                Recipient::Room(departure.room_id.clone()),
                ServerMessage::HostChanged {
                    new_host_id,
                    message: format!("{} is now the host", room.host_name()),
                },
            ));
        }
        batch.extend(room_update(
            departure.room_id.clone(),
            room.game_data(),
            outcome,
        ));
        self.dispatch(batch);
    }

    fn lobby_batch(&self) -> Batch {
        vec![
            (
                Recipient::Lobby,
                ServerMessage::RoomList {
                    rooms: self.registry.list_open_rooms(),
                },
            ),
            (
                Recipient::Lobby,
                ServerMessage::OngoingGames {
                    games: self.registry.list_ongoing_games(),
                },
            ),
        ]
    }

    fn dispatch(&self, batch: Batch) {
        for (recipient, msg) in batch {
            match recipient {
                Recipient::Player(player_id) => self.send(player_id, msg),
                Recipient::Room(room_id) => self.send_room(&room_id, &msg),
                Recipient::Lobby => {
                    for &player_id in self.outbound.keys() {
                        self.send(player_id, msg.clone());
                    }
                }
            }
        }
    }

    fn send_room(&self, room_id: &RoomId, msg: &ServerMessage) {
        let Some(room) = self.registry.room(room_id) else {
            return;
        };
        for player_id in room.audience() {
            self.send(player_id, msg.clone());
        }
    }

    fn send(&self, player_id: PlayerId, msg: ServerMessage) {
        let Some(tx) = self.outbound.get(&player_id) else {
            return;
        };
        if tx.send(msg).is_err() {
            debug!(%player_id, "outbound channel closed");
        }
    }

    /// Milliseconds since the gateway was created.
    fn server_time(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// `gameUpdate`, plus `roundStart` when the change opened a new round.
fn room_update(room_id: RoomId, game_data: GameData, outcome: TurnOutcome) -> Batch {
    let mut batch = vec![(Recipient::Room(room_id.clone()), ServerMessage::GameUpdate { game_data })];
    if let Some(round) = outcome.round_started {
        batch.push((Recipient::Room(room_id), ServerMessage::RoundStart { round }));
    }
    batch
}
