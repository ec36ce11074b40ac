//! Error types for the session layer.

use std::time::Duration;

use pighouse_protocol::{ErrorCode, PlayerId};

use crate::Action;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The connection is acting faster than its limit allows.
    #[error("too many {action} requests, retry in {}s", retry_after.as_secs().max(1))]
    RateLimited { action: Action, retry_after: Duration },

    /// No session exists for the given connection.
    #[error("session not found for player {0}")]
    NotFound(PlayerId),

    /// The seat token is unknown or belongs to a different room.
    #[error("invalid session token")]
    InvalidToken,

    /// The seat's grace period has elapsed.
    #[error("session expired for player {0}")]
    SessionExpired(PlayerId),

    /// The seat is still held by a live connection, or the connection
    /// is already registered.
    #[error("player {0} is still connected")]
    AlreadyConnected(PlayerId),
}

impl SessionError {
    /// Wire code sent to the client.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::SessionExpired(_) => ErrorCode::SessionExpired,
            Self::NotFound(_) | Self::InvalidToken | Self::AlreadyConnected(_) => {
                ErrorCode::ValidationError
            }
        }
    }
}
