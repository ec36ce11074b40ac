//! The round engine: starting a game, resolving card picks, recycling
//! hands between rounds, and deciding who won.
//!
//! ```text
//! start_game ──→ select_card ──(treasure/trap goal)──→ finished
//!                    │    ↑
//!     (every connected player flipped once)
//!                    ▼    │
//!                 end_round ──(round > max_rounds)──→ finished (guardians)
//! ```
//!
//! Every operation validates first and mutates second, so a rejected
//! intent leaves the room exactly as it was.

use pighouse_protocol::{Card, CardKind, GameState, PlayerId, Role};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::distribute::{Deal, distribute};
use crate::registry::{Departure, DepartureKind};
use crate::room::Progress;
use crate::{GameConfig, GameError, Room, deck};

/// Victory message when departures leave too few players.
pub const NOT_ENOUGH_PLAYERS: &str = "not enough players";

/// What a state-changing call did beyond the obvious.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnOutcome {
    /// A new round began; the value is its number.
    pub round_started: Option<u32>,
    /// The game just reached `finished`.
    pub finished: bool,
}

/// Owns the randomness for role assignment and dealing.
pub struct RoundEngine {
    rng: StdRng,
    config: GameConfig,
}

impl RoundEngine {
    pub fn new(config: GameConfig) -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            config: config.validated(),
        }
    }

    /// Deterministic deals for tests.
    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config: config.validated(),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Starts the game: roles, hands, goals, and the first key holder.
    ///
    /// # Errors
    /// - [`GameError::NotHost`]: `actor` is not the host
    /// - [`GameError::GameAlreadyStarted`]: the room is not waiting
    /// - [`GameError::NotEnoughPlayers`]: connected count outside the
    ///   configured range
    pub fn start_game(&mut self, room: &mut Room, actor: PlayerId) -> Result<(), GameError> {
        if room.host_id != actor {
            return Err(GameError::NotHost);
        }
        if room.state != GameState::Waiting {
            return Err(GameError::GameAlreadyStarted(room.id.clone()));
        }
        let connected = room.connected_count();
        if connected < self.config.min_players || connected > self.config.max_players {
            return Err(GameError::NotEnoughPlayers {
                connected,
                min: self.config.min_players,
            });
        }

        let plan = deck::generate(connected, &mut self.rng);
        let hand_size = self.config.hand_size_for_round(1);
        let deal = distribute(plan.cards, connected, hand_size, &mut self.rng)?;

        let mut roles = plan.roles.into_iter();
        let mut hands = deal.hands.into_iter();
        for player in &mut room.players {
            if player.connected {
                player.role = roles.next();
                player.hand = hands.next().unwrap_or_default();
            } else {
                player.role = None;
                player.hand.clear();
            }
        }

        room.progress = Progress {
            current_round: 1,
            cards_per_player: hand_size,
            treasure_goal: plan.treasure_goal,
            trap_goal: plan.trap_goal,
            total_treasures: plan.total_treasures,
            total_traps: plan.total_traps,
            key_holder: room.first_connected(),
            remaining_cards: deal.remaining,
            ..Progress::new(self.config.max_rounds)
        };
        room.state = GameState::Playing;
        room.touch();

        tracing::info!(
            room_id = %room.id,
            players = connected,
            treasure_goal = room.progress.treasure_goal,
            trap_goal = room.progress.trap_goal,
            "game started"
        );
        Ok(())
    }

    /// The key holder turns over card `card_index` of `target`'s hand.
    ///
    /// On success the key passes to `target`, unless the flip won the
    /// game. When every connected player has had a card flipped this
    /// round, the round ends and hands are recycled.
    pub fn select_card(
        &mut self,
        room: &mut Room,
        actor: PlayerId,
        target: PlayerId,
        card_index: usize,
    ) -> Result<TurnOutcome, GameError> {
        if room.state != GameState::Playing {
            return Err(GameError::NotPlaying(room.id.clone()));
        }
        if room.is_spectator(actor) {
            return Err(GameError::InvalidMove("spectators cannot pick cards"));
        }
        if room.player(actor).is_none() {
            return Err(GameError::PlayerNotFound(actor));
        }
        if room.progress.key_holder != Some(actor) {
            return Err(GameError::NotYourTurn);
        }
        let target_player = room.player(target).ok_or(GameError::PlayerNotFound(target))?;
        if target == actor {
            return Err(GameError::InvalidMove("cannot pick from your own hand"));
        }
        if !target_player.connected {
            return Err(GameError::InvalidMove("that player is disconnected"));
        }
        match target_player.hand.get(card_index) {
            None => return Err(GameError::InvalidMove("no card at that position")),
            Some(card) if card.revealed => {
                return Err(GameError::InvalidMove("that card is already revealed"));
            }
            Some(_) => {}
        }

        // Work out the round end first so a deal that cannot be covered
        // rejects the pick before anything is revealed.
        let (kind, closes_round) = {
            let progress = &room.progress;
            let kind = target_player.hand[card_index].kind;
            let wins = match kind {
                CardKind::Treasure => progress.treasure_found + 1 >= progress.treasure_goal,
                CardKind::Trap => progress.trap_triggered + 1 >= progress.trap_goal,
                CardKind::Empty => false,
            };
            (kind, !wins && progress.cards_flipped_this_round + 1 >= room.connected_count())
        };
        let round_end = if closes_round {
            Some(self.plan_round_end(room, Some((target, card_index)))?)
        } else {
            None
        };

        if let Some(player) = room.player_mut(target) {
            player.hand[card_index].revealed = true;
        }
        let progress = &mut room.progress;
        match kind {
            CardKind::Treasure => progress.treasure_found += 1,
            CardKind::Trap => progress.trap_triggered += 1,
            CardKind::Empty => {}
        }
        progress.cards_flipped_this_round += 1;
        room.touch();

        tracing::debug!(room_id = %room.id, %actor, %target, %kind, "card revealed");

        if check_goals(room) {
            return Ok(TurnOutcome {
                round_started: None,
                finished: true,
            });
        }

        room.progress.key_holder = Some(target);
        Ok(match round_end {
            Some(end) => apply_round_end(room, end),
            None => TurnOutcome::default(),
        })
    }

    /// Closes the current round.
    ///
    /// Past the last round the guardians win by survival. Otherwise every
    /// unrevealed card (hands and reserve) is pooled and redealt, one
    /// card fewer per seat, to the connected players.
    ///
    /// # Errors
    /// [`GameError::Deck`] if the pool cannot cover the deal. The room is
    /// left untouched in that case.
    pub fn end_round(&mut self, room: &mut Room) -> Result<TurnOutcome, GameError> {
        let end = self.plan_round_end(room, None)?;
        Ok(apply_round_end(room, end))
    }

    /// Decides how the current round ends without touching the room.
    ///
    /// `flipping` names a card about to be revealed; it is left out of
    /// the pool.
    fn plan_round_end(
        &mut self,
        room: &Room,
        flipping: Option<(PlayerId, usize)>,
    ) -> Result<RoundEnd, GameError> {
        let next_round = room.progress.current_round + 1;
        if next_round > room.progress.max_rounds {
            return Ok(RoundEnd::Survival);
        }

        let pool: Vec<Card> = room
            .players
            .iter()
            .flat_map(|p| {
                p.hand
                    .iter()
                    .enumerate()
                    .filter(move |(i, _)| flipping != Some((p.id, *i)))
                    .map(|(_, c)| c)
            })
            .chain(room.progress.remaining_cards.iter())
            .filter(|c| !c.revealed)
            .copied()
            .collect();
        let hand_size = self.config.hand_size_for_round(next_round);
        let deal = distribute(pool, room.connected_count(), hand_size, &mut self.rng)?;
        Ok(RoundEnd::Deal {
            round: next_round,
            hand_size,
            deal,
        })
    }

    /// Repairs the round after a seat left or dropped mid-game.
    ///
    /// A leaver's unrevealed cards go back to the reserve; a departing
    /// key holder passes the key along in seat order. Below two connected
    /// players the game ends with no winner.
    pub fn handle_departure(
        &mut self,
        room: &mut Room,
        departure: &Departure,
    ) -> Result<TurnOutcome, GameError> {
        if departure.state != GameState::Playing || room.state != GameState::Playing {
            return Ok(TurnOutcome::default());
        }
        let Some(seat) = departure.seat() else {
            return Ok(TurnOutcome::default());
        };

        if let DepartureKind::Left { hand, .. } = &departure.kind {
            room.progress
                .remaining_cards
                .extend(hand.iter().filter(|c| !c.revealed).copied());
        }
        if room.progress.key_holder == Some(departure.player_id) {
            room.progress.key_holder = room.next_connected_from(seat);
        }

        let connected = room.connected_count();
        if connected < 2 {
            finish(room, None, NOT_ENOUGH_PLAYERS.to_string());
            return Ok(TurnOutcome {
                round_started: None,
                finished: true,
            });
        }
        if room.progress.cards_flipped_this_round >= connected {
            return self.end_round(room);
        }
        Ok(TurnOutcome::default())
    }

    /// Puts a finished room back to waiting with everything cleared.
    pub fn restart(&mut self, room: &mut Room, actor: PlayerId) -> Result<(), GameError> {
        if room.host_id != actor {
            return Err(GameError::NotHost);
        }
        if room.state != GameState::Finished {
            return Err(GameError::InvalidMove("the game has not finished"));
        }
        for player in &mut room.players {
            player.role = None;
            player.hand.clear();
        }
        room.progress = Progress::new(self.config.max_rounds);
        room.state = GameState::Waiting;
        room.touch();
        tracing::info!(room_id = %room.id, "game restarted");
        Ok(())
    }
}

/// How a round closes, worked out before the room changes.
enum RoundEnd {
    /// The last round passed; the guardians win.
    Survival,
    Deal {
        round: u32,
        hand_size: usize,
        deal: Deal,
    },
}

fn apply_round_end(room: &mut Room, end: RoundEnd) -> TurnOutcome {
    let (next_round, hand_size, deal) = match end {
        RoundEnd::Survival => {
            room.progress.current_round += 1;
            let message = format!(
                "The guardians held out for {} rounds!",
                room.progress.max_rounds
            );
            finish(room, Some(Role::Guardian), message);
            return TurnOutcome {
                round_started: None,
                finished: true,
            };
        }
        RoundEnd::Deal {
            round,
            hand_size,
            deal,
        } => (round, hand_size, deal),
    };

    let mut hands = deal.hands.into_iter();
    for player in &mut room.players {
        player.hand = if player.connected {
            hands.next().unwrap_or_default()
        } else {
            Vec::new()
        };
    }

    let progress = &mut room.progress;
    progress.current_round = next_round;
    progress.cards_per_player = hand_size;
    progress.cards_flipped_this_round = 0;
    progress.remaining_cards = deal.remaining;
    if !progress.key_holder.is_some_and(|id| room.players.iter().any(|p| p.id == id && p.connected)) {
        progress.key_holder = room.players.iter().find(|p| p.connected).map(|p| p.id);
    }
    room.touch();

    tracing::info!(room_id = %room.id, round = next_round, hand_size, "round started");
    TurnOutcome {
        round_started: Some(next_round),
        finished: false,
    }
}

/// Ends the game if either goal has been reached. Returns `true` if it did.
fn check_goals(room: &mut Room) -> bool {
    let p = &room.progress;
    if p.treasure_found >= p.treasure_goal {
        finish(
            room,
            Some(Role::Adventurer),
            "The adventurers found every treasure!".to_string(),
        );
        true
    } else if p.trap_triggered >= p.trap_goal {
        finish(
            room,
            Some(Role::Guardian),
            "The guardians sprang their traps!".to_string(),
        );
        true
    } else {
        false
    }
}

fn finish(room: &mut Room, winner: Option<Role>, message: String) {
    room.state = GameState::Finished;
    room.progress.winning_team = winner;
    room.progress.victory_message = Some(message);
    room.touch();
    tracing::info!(room_id = %room.id, winner = ?winner, "game finished");
}
