//! Error types for rooms, decks, and rounds.

use pighouse_protocol::{ErrorCode, PlayerId, RoomId};

/// The deck could not cover the requested deal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeckError {
    /// `players * per_player` exceeds the cards available.
    #[error("deck too small: need {needed} cards, have {available}")]
    Undersized { needed: usize, available: usize },
}

/// Errors from registry and round-engine operations.
///
/// None of these mutate the room they were raised against. They go back
/// to the actor only, as an `error` event carrying [`code`](Self::code).
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    #[error("wrong password for room {0}")]
    InvalidPassword(RoomId),

    #[error("room {0} is full")]
    RoomFull(RoomId),

    #[error("room {0} has already started")]
    GameAlreadyStarted(RoomId),

    #[error("the name {0:?} is already taken in this room")]
    DuplicateName(String),

    /// The connection already sits in a room; the gateway leaves first.
    #[error("player {0} is already in room {1}")]
    AlreadyInRoom(PlayerId, RoomId),

    /// The seat being reclaimed is still held by a live connection.
    #[error("seat for player {0} is still occupied")]
    SeatOccupied(PlayerId),

    #[error("no game is being played in room {0}")]
    NotPlaying(RoomId),

    #[error("only the host can do that")]
    NotHost,

    #[error("need at least {min} connected players, have {connected}")]
    NotEnoughPlayers { connected: usize, min: usize },

    #[error("it is not your turn")]
    NotYourTurn,

    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    #[error("invalid move: {0}")]
    InvalidMove(&'static str),

    #[error(transparent)]
    Deck(#[from] DeckError),
}

impl GameError {
    /// Wire code sent to the client.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RoomNotFound(_) => ErrorCode::RoomNotFound,
            Self::InvalidPassword(_) => ErrorCode::InvalidPassword,
            Self::RoomFull(_) => ErrorCode::RoomFull,
            Self::GameAlreadyStarted(_) => ErrorCode::GameAlreadyStarted,
            Self::DuplicateName(_) => ErrorCode::DuplicateName,
            Self::AlreadyInRoom(..) | Self::SeatOccupied(_) => ErrorCode::ValidationError,
            Self::NotPlaying(_) => ErrorCode::NotPlaying,
            Self::NotHost => ErrorCode::NotHost,
            Self::NotEnoughPlayers { .. } => ErrorCode::NotEnoughPlayers,
            Self::NotYourTurn => ErrorCode::NotYourTurn,
            Self::PlayerNotFound(_) => ErrorCode::PlayerNotFound,
            Self::InvalidMove(_) => ErrorCode::InvalidMove,
            Self::Deck(_) => ErrorCode::ServerError,
        }
    }
}
