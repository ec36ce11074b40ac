//! Core protocol types for Pighouse's wire format.
//!
//! Every type in this module travels "on the wire": the server serializes
//! it to a JSON text frame and the browser client parses it. Field names
//! are camelCase and enum tags are the event names the client listens for
//! (`roomCreated`, `gameUpdate`, ...), so the JSON shape is part of the
//! public contract and is pinned by the tests at the bottom of the file.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Connection-scoped identity of a player or spectator.
///
/// Assigned by the transport when a socket is accepted and never reused
/// while the process is alive. A player who reconnects gets a fresh
/// `PlayerId`; reclaiming the old seat goes through a session token.
///
/// `#[serde(transparent)]` keeps it a plain number in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A room code such as `"K7Q2XB"`: short, uppercase, alphanumeric, so it
/// can be read aloud and typed on a phone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

// ---------------------------------------------------------------------------
// Game vocabulary shared by the engine and the client
// ---------------------------------------------------------------------------

/// The two opposing teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Explorers trying to uncover every treasure.
    Adventurer,
    /// Trap-keepers trying to spring enough traps or run out the clock.
    Guardian,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adventurer => write!(f, "adventurer"),
            Self::Guardian => write!(f, "guardian"),
        }
    }
}

/// What is printed on the hidden face of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    Treasure,
    Trap,
    Empty,
}

impl fmt::Display for CardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Treasure => write!(f, "treasure"),
            Self::Trap => write!(f, "trap"),
            Self::Empty => write!(f, "empty"),
        }
    }
}

/// A single card in the deck.
///
/// `revealed` only ever goes from `false` to `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Unique within one deck.
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: CardKind,
    pub revealed: bool,
}

impl Card {
    /// Creates a face-down card.
    pub fn new(id: u32, kind: CardKind) -> Self {
        Self {
            id,
            kind,
            revealed: false,
        }
    }
}

/// Lifecycle of a room.
///
/// ```text
/// Waiting ──(start)──→ Playing ──(win / round limit)──→ Finished
///    ↑                                                     │
///    └──────────────────────(restart)──────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    #[default]
    Waiting,
    Playing,
    Finished,
}

impl GameState {
    /// Returns `true` if players may still join.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// One seat as the client sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub connected: bool,
    pub role: Option<Role>,
    pub hand: Vec<Card>,
    pub is_host: bool,
}

/// The full, server-authoritative room aggregate.
///
/// Sent whole on every change; clients replace their copy rather than
/// patching it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameData {
    pub room_id: RoomId,
    pub host_id: PlayerId,
    pub has_password: bool,
    pub game_state: GameState,
    pub players: Vec<PlayerView>,
    pub spectator_count: usize,

    pub current_round: u32,
    pub max_rounds: u32,
    pub cards_per_player: usize,
    pub cards_flipped_this_round: usize,

    pub treasure_found: u32,
    pub trap_triggered: u32,
    pub treasure_goal: u32,
    pub trap_goal: u32,
    pub total_treasures: u32,
    pub total_traps: u32,

    pub key_holder_id: Option<PlayerId>,
    pub winning_team: Option<Role>,
    pub victory_message: Option<String>,
    pub remaining_cards: Vec<Card>,
}

/// A room that is still accepting players, as listed in the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: RoomId,
    pub host_name: String,
    /// Connected players only.
    pub player_count: usize,
    pub has_password: bool,
}

/// A game in progress, as listed for would-be spectators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OngoingGame {
    pub id: RoomId,
    pub host_name: String,
    pub player_count: usize,
    pub spectator_count: usize,
    pub current_round: u32,
    pub max_rounds: u32,
    pub treasure_found: u32,
    pub treasure_goal: u32,
    pub trap_triggered: u32,
    pub trap_goal: u32,
}

/// One line of room chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub player_id: PlayerId,
    pub player_name: String,
    pub text: String,
    /// Milliseconds since the server started.
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Delivery scope for an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Only this connection.
    Player(PlayerId),
    /// Every player and spectator currently attached to the room.
    Room(RoomId),
    /// Every connected client.
    Lobby,
}

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Machine-readable reason attached to every `error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    RoomNotFound,
    RoomFull,
    InvalidPassword,
    GameAlreadyStarted,
    DuplicateName,
    NotYourTurn,
    InvalidMove,
    PlayerNotFound,
    RateLimited,
    ServerError,
    NotPlaying,
    NotHost,
    NotEnoughPlayers,
    SessionExpired,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::RoomFull => "ROOM_FULL",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::GameAlreadyStarted => "GAME_ALREADY_STARTED",
            Self::DuplicateName => "DUPLICATE_NAME",
            Self::NotYourTurn => "NOT_YOUR_TURN",
            Self::InvalidMove => "INVALID_MOVE",
            Self::PlayerNotFound => "PLAYER_NOT_FOUND",
            Self::RateLimited => "RATE_LIMITED",
            Self::ServerError => "SERVER_ERROR",
            Self::NotPlaying => "NOT_PLAYING",
            Self::NotHost => "NOT_HOST",
            Self::NotEnoughPlayers => "NOT_ENOUGH_PLAYERS",
            Self::SessionExpired => "SESSION_EXPIRED",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ClientMessage (intents)
// ---------------------------------------------------------------------------

/// Everything a client can ask the server to do.
///
/// Internally tagged: `{"type": "joinRoom", "roomId": "ABC123", ...}`.
/// Unknown tags and missing fields fail to decode, so the gateway only
/// ever sees well-formed intents; semantic checks (name length, room code
/// alphabet) happen afterwards in the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    CreateRoom {
        player_name: String,
        #[serde(default)]
        has_password: bool,
        #[serde(default)]
        password: String,
    },

    JoinRoom {
        room_id: String,
        player_name: String,
        #[serde(default)]
        password: String,
    },

    /// Reclaim a seat left behind by a dropped connection.
    RejoinRoom {
        room_id: String,
        session_token: String,
    },

    SpectateRoom {
        room_id: String,
        spectator_name: String,
    },

    LeaveRoom,

    StartGame,

    SelectCard {
        target_player_id: PlayerId,
        card_index: usize,
    },

    SendChat {
        text: String,
    },

    RestartGame,

    GetRoomList,

    GetOngoingGames,

    Heartbeat {
        client_time: u64,
    },
}

impl ClientMessage {
    /// The wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "createRoom",
            Self::JoinRoom { .. } => "joinRoom",
            Self::RejoinRoom { .. } => "rejoinRoom",
            Self::SpectateRoom { .. } => "spectateRoom",
            Self::LeaveRoom => "leaveRoom",
            Self::StartGame => "startGame",
            Self::SelectCard { .. } => "selectCard",
            Self::SendChat { .. } => "sendChat",
            Self::RestartGame => "restartGame",
            Self::GetRoomList => "getRoomList",
            Self::GetOngoingGames => "getOngoingGames",
            Self::Heartbeat { .. } => "heartbeat",
        }
    }
}

// ---------------------------------------------------------------------------
// ServerMessage (events)
// ---------------------------------------------------------------------------

/// Everything the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// First frame on every connection: "this is who you are".
    Connected {
        player_id: PlayerId,
    },

    RoomCreated {
        room_id: RoomId,
        game_data: GameData,
        is_host: bool,
        session_token: String,
    },

    RoomJoined {
        room_id: RoomId,
        game_data: GameData,
        is_host: bool,
        session_token: String,
    },

    SpectateSuccess {
        room_id: RoomId,
        game_data: GameData,
    },

    LeftRoom {
        room_id: RoomId,
    },

    /// The room went away underneath a spectator (or an idle member).
    RoomClosed {
        room_id: RoomId,
    },

    GameUpdate {
        game_data: GameData,
    },

    RoundStart {
        round: u32,
    },

    HostChanged {
        new_host_id: PlayerId,
        message: String,
    },

    NewMessage {
        history: Vec<ChatEntry>,
    },

    RoomList {
        rooms: Vec<RoomSummary>,
    },

    OngoingGames {
        games: Vec<OngoingGame>,
    },

    HeartbeatAck {
        client_time: u64,
        server_time: u64,
    },

    Error {
        code: ErrorCode,
        message: String,
    },
}

// =========================================================================
// Tests
// =========================================================================
