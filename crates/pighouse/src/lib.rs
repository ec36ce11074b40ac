//! # Pighouse
//!
//! Authoritative server for the Pighouse card game: players join a room,
//! receive secret roles, and take turns flipping each other's cards
//! looking for treasure while the guardians try to spring traps.
//!
//! The crate wires the lower layers together:
//!
//! ```text
//! pighouse-transport (WebSocket frames)
//!     → pighouse-protocol (ClientMessage / ServerMessage)
//!     → Gateway (validation, rate limits, fan-out)
//!     → pighouse-game (RoomRegistry, RoundEngine) + pighouse-session
//! ```
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), pighouse::PighouseError> {
//! let config = pighouse::ServerConfig::from_env();
//! let server = pighouse::PighouseServer::builder().config(config).build().await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod gateway;
mod handler;
mod server;
pub mod validate;

pub use config::ServerConfig;
pub use error::PighouseError;
pub use gateway::{Gateway, Outbound, SweepReport};
pub use server::{PighouseServer, PighouseServerBuilder};

/// Everything needed to embed or test the server.
pub mod prelude {
    pub use crate::{Gateway, PighouseError, PighouseServer, ServerConfig};
    pub use pighouse_game::GameConfig;
    pub use pighouse_protocol::{ClientMessage, ErrorCode, PlayerId, RoomId, ServerMessage};
    pub use pighouse_session::SessionConfig;
}
