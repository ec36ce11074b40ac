//! Game configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tunables for rooms and rounds.
///
/// The deck table only covers 3 to 10 players and deals exactly five
/// cards per seat, so [`validated`](Self::validated) pulls anything
/// outside those bounds back in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Connected players needed before the host may start.
    pub min_players: usize,

    /// Player entries (connected or not) a room may hold.
    pub max_players: usize,

    /// Rounds before the guardians win by survival.
    pub max_rounds: u32,

    /// Cards per seat in round 1. Each later round deals one fewer.
    pub initial_hand_size: usize,

    /// Chat lines kept per room.
    pub chat_history: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 3,
            max_players: 10,
            max_rounds: 4,
            initial_hand_size: 5,
            chat_history: 20,
        }
    }
}

impl GameConfig {
    /// Smallest table the deck generator knows about.
    pub const MIN_TABLE: usize = 3;
    /// Largest table the deck generator knows about.
    pub const MAX_TABLE: usize = 10;
    /// The generated deck holds exactly this many cards per seat.
    pub const MAX_HAND: usize = 5;

    /// Returns a copy with every field forced into a playable range.
    pub fn validated(mut self) -> Self {
        let min = self.min_players.clamp(Self::MIN_TABLE, Self::MAX_TABLE);
        if min != self.min_players {
            warn!(requested = self.min_players, used = min, "min_players out of range, clamping");
            self.min_players = min;
        }
        let max = self.max_players.clamp(self.min_players, Self::MAX_TABLE);
        if max != self.max_players {
            warn!(requested = self.max_players, used = max, "max_players out of range, clamping");
            self.max_players = max;
        }
        let hand = self.initial_hand_size.clamp(1, Self::MAX_HAND);
        if hand != self.initial_hand_size {
            warn!(requested = self.initial_hand_size, used = hand, "initial_hand_size out of range, clamping");
            self.initial_hand_size = hand;
        }
        // every round must deal at least one card
        let rounds = self.max_rounds.clamp(1, self.initial_hand_size as u32);
        if rounds != self.max_rounds {
            warn!(requested = self.max_rounds, used = rounds, "max_rounds out of range, clamping");
            self.max_rounds = rounds;
        }
        self.chat_history = self.chat_history.max(1);
        self
    }

    /// Hand size dealt at the start of `round` (1-based): 5, 4, 3, 2 with
    /// the defaults.
    pub fn hand_size_for_round(&self, round: u32) -> usize {
        self.initial_hand_size
            .saturating_sub(round.saturating_sub(1) as usize)
    }
}
