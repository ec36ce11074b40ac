//! Unified error type for the Pighouse server.

use pighouse_game::{DeckError, GameError};
use pighouse_protocol::{ErrorCode, ProtocolError};
use pighouse_session::SessionError;
use pighouse_transport::TransportError;

use crate::validate::ValidationError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically. [`code`](Self::code) picks the wire code the
/// client sees.
#[derive(Debug, thiserror::Error)]
pub enum PighouseError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Rate limits and seat tokens.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Room and round rules.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Malformed names, room codes, passwords, or chat text.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A background task stopped unexpectedly.
    #[error("{0} task stopped: {1}")]
    TaskFailed(&'static str, String),
}

impl From<DeckError> for PighouseError {
    fn from(err: DeckError) -> Self {
        Self::Game(GameError::Deck(err))
    }
}

impl PighouseError {
    /// Wire code sent to the client.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Protocol(_) | Self::Validation(_) => ErrorCode::ValidationError,
            Self::Session(e) => e.code(),
            Self::Game(e) => e.code(),
            Self::Transport(_) | Self::TaskFailed(..) => ErrorCode::ServerError,
        }
    }
}
