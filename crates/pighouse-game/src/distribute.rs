//! Dealing a card pool into hands.

use pighouse_protocol::Card;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::DeckError;

/// The result of a deal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deal {
    /// `hands[i]` goes to the i-th recipient.
    pub hands: Vec<Vec<Card>>,
    /// Cards left over after every hand is full.
    pub remaining: Vec<Card>,
}

/// Shuffles `cards`, deals `per_player` to each of `players` in turn,
/// then shuffles each hand on its own.
///
/// # Errors
/// [`DeckError::Undersized`] if there are fewer than
/// `players * per_player` cards. Nothing is dealt in that case.
pub fn distribute<R: Rng + ?Sized>(
    mut cards: Vec<Card>,
    players: usize,
    per_player: usize,
    rng: &mut R,
) -> Result<Deal, DeckError> {
    let needed = players.saturating_mul(per_player);
    if cards.len() < needed {
        return Err(DeckError::Undersized {
            needed,
            available: cards.len(),
        });
    }

    cards.shuffle(rng);
    let remaining = cards.split_off(needed);

    let mut hands: Vec<Vec<Card>> = cards
        .chunks(per_player.max(1))
        .take(players)
        .map(<[Card]>::to_vec)
        .collect();
    // per_player == 0 still yields one (empty) hand per player
    hands.resize_with(players, Vec::new);
    for hand in &mut hands {
        hand.shuffle(rng);
    }

    Ok(Deal { hands, remaining })
}
