//! The room aggregate: seats, spectators, chat, and round progress.
//!
//! A [`Room`] is plain data. [`RoomRegistry`](crate::RoomRegistry) owns
//! membership (who sits where, who hosts) and
//! [`RoundEngine`](crate::RoundEngine) owns [`Progress`] and the cards in
//! each hand.

use std::collections::VecDeque;
use std::time::Instant;

use pighouse_protocol::{
    Card, ChatEntry, GameData, GameState, OngoingGame, PlayerId, PlayerView, Role, RoomId,
    RoomSummary,
};

// ---------------------------------------------------------------------------
// Seats
// ---------------------------------------------------------------------------

/// One seat at the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Identity of the connection currently holding the seat. Replaced
    /// when the seat is reclaimed after a reconnect.
    pub id: PlayerId,
    pub name: String,
    pub connected: bool,
    pub role: Option<Role>,
    pub hand: Vec<Card>,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            connected: true,
            role: None,
            hand: Vec::new(),
        }
    }
}

/// Someone watching a game in progress. Never part of the seat order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spectator {
    pub id: PlayerId,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Bounded chat history; the oldest line falls off when full.
#[derive(Debug, Clone)]
pub struct ChatLog {
    entries: VecDeque<ChatEntry>,
    capacity: usize,
}

impl ChatLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: ChatEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Oldest first.
    pub fn history(&self) -> Vec<ChatEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Round counters, goals, and outcome. Reset wholesale on restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub current_round: u32,
    pub max_rounds: u32,
    pub cards_per_player: usize,
    pub cards_flipped_this_round: usize,
    pub treasure_found: u32,
    pub trap_triggered: u32,
    pub treasure_goal: u32,
    pub trap_goal: u32,
    pub total_treasures: u32,
    pub total_traps: u32,
    /// The player who picks the next card.
    pub key_holder: Option<PlayerId>,
    pub winning_team: Option<Role>,
    pub victory_message: Option<String>,
    pub remaining_cards: Vec<Card>,
}

impl Progress {
    pub fn new(max_rounds: u32) -> Self {
        Self {
            current_round: 0,
            max_rounds,
            cards_per_player: 0,
            cards_flipped_this_round: 0,
            treasure_found: 0,
            trap_triggered: 0,
            treasure_goal: 0,
            trap_goal: 0,
            total_treasures: 0,
            total_traps: 0,
            key_holder: None,
            winning_team: None,
            victory_message: None,
            remaining_cards: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// A single game room.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub host_id: PlayerId,
    /// Never sent to clients; they only see whether one is set.
    pub password: Option<String>,
    /// Join order is seat order.
    pub players: Vec<Player>,
    pub spectators: Vec<Spectator>,
    pub state: GameState,
    pub progress: Progress,
    pub chat: ChatLog,
    pub last_activity: Instant,
}

impl Room {
    pub fn new(
        id: RoomId,
        host: Player,
        password: Option<String>,
        max_rounds: u32,
        chat_history: usize,
    ) -> Self {
        Self {
            id,
            host_id: host.id,
            password,
            players: vec![host],
            spectators: Vec::new(),
            state: GameState::Waiting,
            progress: Progress::new(max_rounds),
            chat: ChatLog::new(chat_history),
            last_activity: Instant::now(),
        }
    }

    /// Marks the room as active now.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn seat_of(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub fn is_spectator(&self, id: PlayerId) -> bool {
        self.spectators.iter().any(|s| s.id == id)
    }

    pub fn connected_count(&self) -> usize {
        self.players.iter().filter(|p| p.connected).count()
    }

    pub fn is_connected(&self, id: PlayerId) -> bool {
        self.player(id).is_some_and(|p| p.connected)
    }

    /// First connected player in seat order.
    pub fn first_connected(&self) -> Option<PlayerId> {
        self.players.iter().find(|p| p.connected).map(|p| p.id)
    }

    /// Next connected player after seat `seat`, wrapping around.
    ///
    /// `seat` may equal `players.len()` (the seat of someone just
    /// removed from the end).
    pub fn next_connected_from(&self, seat: usize) -> Option<PlayerId> {
        let n = self.players.len();
        (0..n)
            .map(|offset| &self.players[(seat + offset) % n])
            .find(|p| p.connected)
            .map(|p| p.id)
    }

    pub fn host_name(&self) -> &str {
        self.player(self.host_id).map_or("", |p| p.name.as_str())
    }

    /// Every identity that should receive room-scoped broadcasts.
    pub fn audience(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.connected)
            .map(|p| p.id)
            .chain(self.spectators.iter().map(|s| s.id))
            .collect()
    }

    /// Case-insensitive name check against the seats.
    pub fn name_taken(&self, name: &str) -> bool {
        let wanted = name.to_lowercase();
        self.players.iter().any(|p| p.name.to_lowercase() == wanted)
    }

    /// Full snapshot sent in `gameUpdate` and friends.
    pub fn game_data(&self) -> GameData {
        let p = &self.progress;
        GameData {
            room_id: self.id.clone(),
            host_id: self.host_id,
            has_password: self.has_password(),
            game_state: self.state,
            players: self
                .players
                .iter()
                .map(|player| PlayerView {
                    id: player.id,
                    name: player.name.clone(),
                    connected: player.connected,
                    role: player.role,
                    hand: player.hand.clone(),
                    is_host: player.id == self.host_id,
                })
                .collect(),
            spectator_count: self.spectators.len(),
            current_round: p.current_round,
            max_rounds: p.max_rounds,
            cards_per_player: p.cards_per_player,
            cards_flipped_this_round: p.cards_flipped_this_round,
            treasure_found: p.treasure_found,
            trap_triggered: p.trap_triggered,
            treasure_goal: p.treasure_goal,
            trap_goal: p.trap_goal,
            total_treasures: p.total_treasures,
            total_traps: p.total_traps,
            key_holder_id: p.key_holder,
            winning_team: p.winning_team,
            victory_message: p.victory_message.clone(),
            remaining_cards: p.remaining_cards.clone(),
        }
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            host_name: self.host_name().to_string(),
            player_count: self.connected_count(),
            has_password: self.has_password(),
        }
    }

    pub fn ongoing(&self) -> OngoingGame {
        let p = &self.progress;
        OngoingGame {
            id: self.id.clone(),
            host_name: self.host_name().to_string(),
            player_count: self.connected_count(),
            spectator_count: self.spectators.len(),
            current_round: p.current_round,
            max_rounds: p.max_rounds,
            treasure_found: p.treasure_found,
            treasure_goal: p.treasure_goal,
            trap_triggered: p.trap_triggered,
            trap_goal: p.trap_goal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_with(names: &[&str]) -> Room {
        let mut room = Room::new(
            RoomId::from("ABC123"),
            Player::new(PlayerId(1), names[0]),
            None,
            4,
            20,
        );
        for (i, name) in names.iter().enumerate().skip(1) {
            room.players.push(Player::new(PlayerId(i as u64 + 1), *name));
        }
        room
    }

    fn chat(n: u64) -> ChatEntry {
        ChatEntry {
            player_id: PlayerId(1),
            player_name: "Mimi".into(),
            text: format!("line {n}"),
            timestamp: n,
        }
    }

    #[test]
    fn test_chat_log_full_drops_oldest() {
        let mut log = ChatLog::new(20);
        for n in 0..25 {
            log.push(chat(n));
        }
        let history = log.history();
        assert_eq!(history.len(), 20);
        assert_eq!(history[0].timestamp, 5);
        assert_eq!(history[19].timestamp, 24);
    }

    #[test]
    fn test_next_connected_from_skips_disconnected_and_wraps() {
        let mut room = room_with(&["A", "B", "C", "D"]);
        room.players[1].connected = false;
        room.players[3].connected = false;
        assert_eq!(room.next_connected_from(1), Some(PlayerId(3)));
        assert_eq!(room.next_connected_from(3), Some(PlayerId(1)));
        assert_eq!(room.next_connected_from(4), Some(PlayerId(1)));
    }

    #[test]
    fn test_next_connected_from_nobody_connected_returns_none() {
        let mut room = room_with(&["A", "B"]);
        for p in &mut room.players {
            p.connected = false;
        }
        assert_eq!(room.next_connected_from(0), None);
        assert_eq!(room.first_connected(), None);
    }

    #[test]
    fn test_name_taken_is_case_insensitive() {
        let room = room_with(&["Mimi"]);
        assert!(room.name_taken("MIMI"));
        assert!(room.name_taken("mimi"));
        assert!(!room.name_taken("Bo"));
    }

    #[test]
    fn test_audience_includes_spectators_but_not_disconnected_seats() {
        let mut room = room_with(&["A", "B"]);
        room.players[1].connected = false;
        room.spectators.push(Spectator {
            id: PlayerId(9),
            name: "Watcher".into(),
        });
        assert_eq!(room.audience(), vec![PlayerId(1), PlayerId(9)]);
    }

    #[test]
    fn test_game_data_hides_password_and_marks_host() {
        let mut room = room_with(&["A", "B"]);
        room.password = Some("secret".into());
        let data = room.game_data();
        assert!(data.has_password);
        assert!(data.players[0].is_host);
        assert!(!data.players[1].is_host);
        assert_eq!(data.max_rounds, 4);
        assert_eq!(data.game_state, GameState::Waiting);
    }

    #[test]
    fn test_summary_counts_connected_only() {
        let mut room = room_with(&["A", "B", "C"]);
        room.players[2].connected = false;
        let summary = room.summary();
        assert_eq!(summary.player_count, 2);
        assert_eq!(summary.host_name, "A");
    }
}
