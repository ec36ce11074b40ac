//! Authoritative game state for Pighouse.
//!
//! Everything in this crate is synchronous and owns no I/O: callers hand
//! in identities and intents, and get back results plus enough
//! information to decide who should hear about the change.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: rooms, membership, hosts, the lobby listings
//! - [`RoundEngine`]: start, card selection, round recycling, win checks
//! - [`deck`] / [`distribute`](distribute::distribute): card pools and deals
//! - [`GameConfig`]: player limits, round count, hand size

mod config;
pub mod deck;
pub mod distribute;
mod engine;
mod error;
mod registry;
mod room;

pub use config::GameConfig;
pub use engine::{RoundEngine, TurnOutcome};
pub use error::{DeckError, GameError};
pub use registry::{CODE_LEN, ClosedRoom, Departure, DepartureKind, RoomRegistry};
pub use room::{ChatLog, Player, Progress, Room, Spectator};
