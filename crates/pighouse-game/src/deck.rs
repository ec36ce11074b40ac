//! Deck generation: role pool, card pool, and victory goals for a table.
//!
//! The composition is a fixed function of the player count:
//!
//! | N  | adventurer/guardian | treasure | trap | empty |
//! |----|---------------------|----------|------|-------|
//! | 3  | 1/2 or 2/1          | 5        | 2    | 8     |
//! | 4  | 2/2 or 3/1          | 6        | 2    | 12    |
//! | 5  | 3/2                 | 7        | 2    | 16    |
//! | 6  | 4/2                 | 8        | 2    | 20    |
//! | 7  | 4/3 or 5/2          | 7        | 2    | 26    |
//! | 8  | 5/3 or 6/2          | 8        | 2    | 30    |
//! | 9  | 6/3                 | 9        | 2    | 34    |
//! | 10 | 6/4 or 7/3          | 10       | 3    | 37    |
//!
//! Every row holds exactly `5 * N` cards.

use pighouse_protocol::{Card, CardKind, Role};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::warn;

use crate::GameConfig;

/// One row of the composition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Composition {
    /// `(adventurers, guardians)` splits; one is picked uniformly.
    pub role_splits: &'static [(usize, usize)],
    pub treasures: u32,
    pub traps: u32,
    pub empties: u32,
}

const TABLE: [Composition; 8] = [
    Composition { role_splits: &[(1, 2), (2, 1)], treasures: 5, traps: 2, empties: 8 },
    Composition { role_splits: &[(2, 2), (3, 1)], treasures: 6, traps: 2, empties: 12 },
    Composition { role_splits: &[(3, 2)], treasures: 7, traps: 2, empties: 16 },
    Composition { role_splits: &[(4, 2)], treasures: 8, traps: 2, empties: 20 },
    Composition { role_splits: &[(4, 3), (5, 2)], treasures: 7, traps: 2, empties: 26 },
    Composition { role_splits: &[(5, 3), (6, 2)], treasures: 8, traps: 2, empties: 30 },
    Composition { role_splits: &[(6, 3)], treasures: 9, traps: 2, empties: 34 },
    Composition { role_splits: &[(6, 4), (7, 3)], treasures: 10, traps: 3, empties: 37 },
];

/// Forces `players` into the range the table covers, warning if it moved.
pub fn clamp_player_count(players: usize) -> usize {
    let clamped = players.clamp(GameConfig::MIN_TABLE, GameConfig::MAX_TABLE);
    if clamped != players {
        warn!(requested = players, used = clamped, "player count outside deck table, clamping");
    }
    clamped
}

/// Looks up the composition for `players` (clamped).
pub fn composition(players: usize) -> &'static Composition {
    &TABLE[clamp_player_count(players) - GameConfig::MIN_TABLE]
}

/// Everything the round engine needs to set up a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckPlan {
    /// Shuffled, one per seat.
    pub roles: Vec<Role>,
    /// Unshuffled, ids `0..len` in treasure, trap, empty order.
    pub cards: Vec<Card>,
    pub treasure_goal: u32,
    pub trap_goal: u32,
    pub total_treasures: u32,
    pub total_traps: u32,
}

/// Builds the role pool, card pool, and goals for a table of `players`.
///
/// Never fails: an out-of-range count is clamped first, so `roles` may
/// be shorter or longer than the caller asked for. The round engine
/// checks the count before calling this.
pub fn generate<R: Rng + ?Sized>(players: usize, rng: &mut R) -> DeckPlan {
    let comp = composition(players);

    let (adventurers, guardians) = if comp.role_splits.len() > 1 && rng.random_bool(0.5) {
        comp.role_splits[1]
    } else {
        comp.role_splits[0]
    };
    let mut roles: Vec<Role> = std::iter::repeat_n(Role::Adventurer, adventurers)
        .chain(std::iter::repeat_n(Role::Guardian, guardians))
        .collect();
    roles.shuffle(rng);

    let kinds = std::iter::repeat_n(CardKind::Treasure, comp.treasures as usize)
        .chain(std::iter::repeat_n(CardKind::Trap, comp.traps as usize))
        .chain(std::iter::repeat_n(CardKind::Empty, comp.empties as usize));
    let cards = kinds
        .enumerate()
        .map(|(id, kind)| Card::new(id as u32, kind))
        .collect();

    DeckPlan {
        roles,
        cards,
        treasure_goal: comp.treasures,
        trap_goal: comp.traps,
        total_treasures: comp.treasures,
        total_traps: comp.traps,
    }
}
