//! Wire protocol for Pighouse.
//!
//! This crate defines what the browser and the server say to each other:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`GameData`], ...):
//!   the JSON documents that travel over the WebSocket.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, messages out.
//! - **Errors** ([`ProtocolError`]).
//!
//! The game crate reuses the domain vocabulary defined here ([`Card`],
//! [`Role`], [`GameState`]) so that the snapshot it produces is the exact
//! structure that gets serialized.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Gateway → Game
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Card, CardKind, ChatEntry, ClientMessage, ErrorCode, GameData, GameState, OngoingGame,
    PlayerId, PlayerView, Recipient, Role, RoomId, RoomSummary, ServerMessage,
};
