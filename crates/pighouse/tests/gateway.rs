//! Gateway integration tests.
//!
//! Each test client is a `PlayerId` plus the receiving half of its
//! outbound channel; broadcasts are observed with `try_recv`, so the
//! whole flow runs synchronously without a socket.

use std::time::{Duration, Instant};

use pighouse::Gateway;
use pighouse_game::GameConfig;
use pighouse_protocol::{
    ClientMessage, Codec, ErrorCode, GameData, GameState, JsonCodec, PlayerId, Role, RoomId,
    ServerMessage,
};
use pighouse_session::{Location, SessionConfig};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::sync::mpsc::error::TryRecvError;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Client {
    id: PlayerId,
    rx: UnboundedReceiver<ServerMessage>,
}

impl Client {
    /// Everything queued for this client so far.
    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            out.push(msg);
        }
        out
    }
}

fn gateway() -> Gateway {
    gateway_with(SessionConfig::default())
}

fn gateway_with(session: SessionConfig) -> Gateway {
    Gateway::with_seed(GameConfig::default(), session, 42)
}

fn connect(gw: &mut Gateway, id: u64) -> Client {
    let (tx, rx) = unbounded_channel();
    gw.connect(PlayerId(id), tx).unwrap();
    let mut client = Client {
        id: PlayerId(id),
        rx,
    };
    assert_eq!(
        client.drain(),
        vec![ServerMessage::Connected {
            player_id: PlayerId(id)
        }]
    );
    client
}

fn create_msg(name: &str) -> ClientMessage {
    ClientMessage::CreateRoom {
        player_name: name.to_string(),
        has_password: false,
        password: String::new(),
    }
}

fn join_msg(room_id: &RoomId, name: &str) -> ClientMessage {
    ClientMessage::JoinRoom {
        room_id: room_id.as_str().to_string(),
        player_name: name.to_string(),
        password: String::new(),
    }
}

/// Creates a room hosted by `client` and returns its code and token.
fn create(gw: &mut Gateway, client: &mut Client, name: &str) -> (RoomId, String) {
    gw.handle(client.id, create_msg(name));
    client
        .drain()
        .into_iter()
        .find_map(|m| match m {
            ServerMessage::RoomCreated {
                room_id,
                session_token,
                ..
            } => Some((room_id, session_token)),
            _ => None,
        })
        .expect("roomCreated")
}

fn join(gw: &mut Gateway, client: &mut Client, room_id: &RoomId, name: &str) -> String {
    gw.handle(client.id, join_msg(room_id, name));
    client
        .drain()
        .into_iter()
        .find_map(|m| match m {
            ServerMessage::RoomJoined { session_token, .. } => Some(session_token),
            _ => None,
        })
        .expect("roomJoined")
}

/// A room with `n` seated players, nothing started. The first client
/// is the host. All queues are drained.
fn table(gw: &mut Gateway, n: u64) -> (RoomId, Vec<Client>, Vec<String>) {
    let names = ["Mimi", "Bo", "Pip", "Rosa", "Tofu", "Hamlet", "Clover", "Biscuit", "Nib", "Wren"];
    let mut clients: Vec<Client> = (1..=n).map(|id| connect(gw, id)).collect();
    let (room_id, host_token) = create(gw, &mut clients[0], names[0]);
    let mut tokens = vec![host_token];
    for (i, client) in clients.iter_mut().enumerate().skip(1) {
        tokens.push(join(gw, client, &room_id, names[i]));
    }
    for client in &mut clients {
        client.drain();
    }
    (room_id, clients, tokens)
}

fn last_game_data(msgs: &[ServerMessage]) -> Option<GameData> {
    msgs.iter().rev().find_map(|m| match m {
        ServerMessage::GameUpdate { game_data }
        | ServerMessage::RoomCreated { game_data, .. }
        | ServerMessage::RoomJoined { game_data, .. }
        | ServerMessage::SpectateSuccess { game_data, .. } => Some(game_data.clone()),
        _ => None,
    })
}

fn error_code(msgs: &[ServerMessage]) -> Option<ErrorCode> {
    msgs.iter().find_map(|m| match m {
        ServerMessage::Error { code, .. } => Some(*code),
        _ => None,
    })
}

fn count<F: Fn(&ServerMessage) -> bool>(msgs: &[ServerMessage], pred: F) -> usize {
    msgs.iter().filter(|m| pred(m)).count()
}

fn start(gw: &mut Gateway, clients: &mut [Client]) -> GameData {
    gw.handle(clients[0].id, ClientMessage::StartGame);
    let msgs = clients[0].drain();
    assert!(msgs.contains(&ServerMessage::RoundStart { round: 1 }));
    for client in clients.iter_mut().skip(1) {
        client.drain();
    }
    last_game_data(&msgs).expect("gameUpdate after start")
}

/// The key holder flips the first unrevealed card of the next
/// connected player in seat order.
fn legal_move(data: &GameData) -> (PlayerId, PlayerId, usize) {
    let actor = data.key_holder_id.expect("key holder while playing");
    let seat = data.players.iter().position(|p| p.id == actor).unwrap();
    let n = data.players.len();
    for offset in 1..n {
        let target = &data.players[(seat + offset) % n];
        if !target.connected {
            continue;
        }
        if let Some(idx) = target.hand.iter().position(|c| !c.revealed) {
            return (actor, target.id, idx);
        }
    }
    panic!("no legal move in {data:?}");
}

// ---------------------------------------------------------------------------
// Rooms and membership
// ---------------------------------------------------------------------------

#[test]
fn test_create_room_replies_with_host_token_and_lobby_list() {
    let mut gw = gateway();
    let mut host = connect(&mut gw, 1);
    let mut lurker = connect(&mut gw, 2);

    gw.handle(host.id, create_msg("Mimi"));
    let msgs = host.drain();
    let created = msgs.iter().find_map(|m| match m {
        ServerMessage::RoomCreated {
            room_id,
            game_data,
            is_host,
            session_token,
        } => Some((room_id.clone(), game_data.clone(), *is_host, session_token.clone())),
        _ => None,
    });
    let (room_id, data, is_host, token) = created.expect("roomCreated");
    assert!(is_host);
    assert_eq!(token.len(), 32);
    assert_eq!(data.host_id, host.id);
    assert_eq!(data.game_state, GameState::Waiting);
    assert_eq!(gw.sessions().location(host.id), Location::Seated(room_id.clone()));

    let lobby = lurker.drain();
    let listed = lobby.iter().any(|m| match m {
        ServerMessage::RoomList { rooms } => rooms.iter().any(|r| r.id == room_id),
        _ => false,
    });
    assert!(listed, "lobby clients see the new room");
}

#[test]
fn test_join_room_broadcasts_update_to_members() {
    let mut gw = gateway();
    let mut host = connect(&mut gw, 1);
    let mut guest = connect(&mut gw, 2);
    let (room_id, _) = create(&mut gw, &mut host, "Mimi");

    gw.handle(guest.id, join_msg(&room_id, "Bo"));

    let guest_msgs = guest.drain();
    assert!(guest_msgs.iter().any(|m| matches!(
        m,
        ServerMessage::RoomJoined { is_host: false, .. }
    )));
    let data = last_game_data(&host.drain()).expect("host sees gameUpdate");
    assert_eq!(data.players.len(), 2);
    assert_eq!(data.players[1].name, "Bo");
}

#[test]
fn test_join_room_lowercase_code_is_normalized() {
    let mut gw = gateway();
    let mut host = connect(&mut gw, 1);
    let mut guest = connect(&mut gw, 2);
    let (room_id, _) = create(&mut gw, &mut host, "Mimi");

    gw.handle(
        guest.id,
        ClientMessage::JoinRoom {
            room_id: room_id.as_str().to_lowercase(),
            player_name: "Bo".into(),
            password: String::new(),
        },
    );
    assert!(error_code(&guest.drain()).is_none());
}

#[test]
fn test_join_room_unknown_room_not_found_no_room_created() {
    let mut gw = gateway();
    let mut guest = connect(&mut gw, 1);

    gw.handle(guest.id, join_msg(&RoomId::from("ZZZZZZ"), "Bo"));

    assert_eq!(error_code(&guest.drain()), Some(ErrorCode::RoomNotFound));
    assert_eq!(gw.registry().room_count(), 0);
    assert_eq!(gw.sessions().location(guest.id), Location::Lobby);
}

#[test]
fn test_join_room_password_checked() {
    let mut gw = gateway();
    let mut host = connect(&mut gw, 1);
    let mut guest = connect(&mut gw, 2);
    let mut other = connect(&mut gw, 3);

    gw.handle(
        host.id,
        ClientMessage::CreateRoom {
            player_name: "Mimi".into(),
            has_password: true,
            password: "oink".into(),
        },
    );
    let data = last_game_data(&host.drain()).unwrap();
    assert!(data.has_password);

    gw.handle(
        guest.id,
        ClientMessage::JoinRoom {
            room_id: data.room_id.as_str().into(),
            player_name: "Bo".into(),
            password: "moo".into(),
        },
    );
    assert_eq!(error_code(&guest.drain()), Some(ErrorCode::InvalidPassword));

    gw.handle(
        other.id,
        ClientMessage::JoinRoom {
            room_id: data.room_id.as_str().into(),
            player_name: "Pip".into(),
            password: "oink".into(),
        },
    );
    assert!(error_code(&other.drain()).is_none());
}

#[test]
fn test_join_room_duplicate_name_rejected_case_insensitive() {
    let mut gw = gateway();
    let mut host = connect(&mut gw, 1);
    let mut guest = connect(&mut gw, 2);
    let (room_id, _) = create(&mut gw, &mut host, "Mimi");

    gw.handle(guest.id, join_msg(&room_id, "MIMI"));
    assert_eq!(error_code(&guest.drain()), Some(ErrorCode::DuplicateName));
}

#[test]
fn test_create_room_invalid_name_validation_error() {
    let mut gw = gateway();
    let mut client = connect(&mut gw, 1);

    gw.handle(client.id, create_msg("<script>"));
    assert_eq!(error_code(&client.drain()), Some(ErrorCode::ValidationError));

    gw.handle(client.id, create_msg("Admin Pig"));
    assert_eq!(error_code(&client.drain()), Some(ErrorCode::ValidationError));
    assert_eq!(gw.registry().room_count(), 0);
}

#[test]
fn test_create_room_twice_within_cooldown_rate_limited() {
    let mut gw = gateway();
    let mut client = connect(&mut gw, 1);
    let now = Instant::now();

    gw.handle_at(client.id, create_msg("Mimi"), now);
    client.drain();
    gw.handle_at(client.id, create_msg("Mimi"), now + Duration::from_secs(1));

    assert_eq!(error_code(&client.drain()), Some(ErrorCode::RateLimited));
    assert_eq!(gw.registry().room_count(), 1);
}

#[test]
fn test_create_room_after_cooldown_leaves_previous_room() {
    let mut gw = gateway();
    let mut client = connect(&mut gw, 1);
    let now = Instant::now();

    gw.handle_at(client.id, create_msg("Mimi"), now);
    let first = last_game_data(&client.drain()).unwrap().room_id;
    gw.handle_at(client.id, create_msg("Mimi"), now + Duration::from_secs(6));
    let msgs = client.drain();

    assert!(msgs.contains(&ServerMessage::LeftRoom {
        room_id: first.clone()
    }));
    assert_eq!(gw.registry().room_count(), 1);
    assert!(gw.registry().room(&first).is_none());
}

#[test]
fn test_leave_room_notifies_leaver_and_members() {
    let mut gw = gateway();
    let (room_id, mut clients, _) = table(&mut gw, 3);

    gw.handle(clients[2].id, ClientMessage::LeaveRoom);

    assert!(clients[2].drain().contains(&ServerMessage::LeftRoom {
        room_id: room_id.clone()
    }));
    let data = last_game_data(&clients[0].drain()).unwrap();
    assert_eq!(data.players.len(), 2);
    assert_eq!(gw.sessions().location(clients[2].id), Location::Lobby);
}

#[test]
fn test_leave_room_host_passes_host_on() {
    let mut gw = gateway();
    let (_, mut clients, _) = table(&mut gw, 3);

    gw.handle(clients[0].id, ClientMessage::LeaveRoom);

    let msgs = clients[1].drain();
    assert!(msgs.iter().any(|m| matches!(
        m,
        ServerMessage::HostChanged { new_host_id, .. } if *new_host_id == PlayerId(2)
    )));
    assert_eq!(last_game_data(&msgs).unwrap().host_id, PlayerId(2));
}

#[test]
fn test_leave_room_not_in_room_validation_error() {
    let mut gw = gateway();
    let mut client = connect(&mut gw, 1);

    gw.handle(client.id, ClientMessage::LeaveRoom);
    assert_eq!(error_code(&client.drain()), Some(ErrorCode::ValidationError));
}

#[test]
fn test_leave_room_last_player_deletes_room_and_releases_token() {
    let mut gw = gateway();
    let mut client = connect(&mut gw, 1);
    let (room_id, token) = create(&mut gw, &mut client, "Mimi");

    gw.handle(client.id, ClientMessage::LeaveRoom);

    assert!(gw.registry().room(&room_id).is_none());
    assert!(gw.sessions().seat(&token).is_none());
}

// ---------------------------------------------------------------------------
// Disconnects and host changes
// ---------------------------------------------------------------------------

#[test]
fn test_disconnect_host_while_waiting_host_changed_once() {
    let mut gw = gateway();
    let (_, mut clients, _) = table(&mut gw, 3);

    gw.disconnect(clients[0].id);
    gw.disconnect(clients[0].id);

    let msgs = clients[1].drain();
    let changes = count(&msgs, |m| matches!(m, ServerMessage::HostChanged { .. }));
    assert_eq!(changes, 1);
    let data = last_game_data(&msgs).unwrap();
    assert_eq!(data.host_id, PlayerId(2));
    assert!(!data.players[0].connected);
}

#[test]
fn test_disconnect_closes_outbound_channel() {
    let mut gw = gateway();
    let mut client = connect(&mut gw, 1);

    gw.disconnect(client.id);

    assert_eq!(client.rx.try_recv(), Err(TryRecvError::Disconnected));
    assert_eq!(gw.connection_count(), 0);
}

#[test]
fn test_disconnect_all_players_spectator_gets_room_closed() {
    let mut gw = gateway();
    let (room_id, mut clients, _) = table(&mut gw, 3);
    start(&mut gw, &mut clients);
    let mut watcher = connect(&mut gw, 50);
    gw.handle(
        watcher.id,
        ClientMessage::SpectateRoom {
            room_id: room_id.as_str().into(),
            spectator_name: "Owl".into(),
        },
    );
    watcher.drain();

    for client in &clients {
        gw.disconnect(client.id);
    }

    let msgs = watcher.drain();
    assert!(msgs.contains(&ServerMessage::RoomClosed {
        room_id: room_id.clone()
    }));
    assert!(gw.registry().room(&room_id).is_none());
    assert_eq!(gw.sessions().location(watcher.id), Location::Lobby);
}

// ---------------------------------------------------------------------------
// Game flow
// ---------------------------------------------------------------------------

#[test]
fn test_start_game_five_players_roles_and_goals() {
    let mut gw = gateway();
    let (_, mut clients, _) = table(&mut gw, 5);

    let data = start(&mut gw, &mut clients);

    assert_eq!(data.game_state, GameState::Playing);
    let adventurers = data.players.iter().filter(|p| p.role == Some(Role::Adventurer)).count();
    let guardians = data.players.iter().filter(|p| p.role == Some(Role::Guardian)).count();
    assert_eq!((adventurers, guardians), (3, 2));
    assert_eq!(data.treasure_goal, 7);
    assert_eq!(data.trap_goal, 2);
    assert_eq!(data.current_round, 1);
    assert!(data.players.iter().all(|p| p.hand.len() == 5));
    assert_eq!(data.key_holder_id, Some(PlayerId(1)));
}

#[test]
fn test_start_game_non_host_not_host() {
    let mut gw = gateway();
    let (_, mut clients, _) = table(&mut gw, 3);

    gw.handle(clients[1].id, ClientMessage::StartGame);
    assert_eq!(error_code(&clients[1].drain()), Some(ErrorCode::NotHost));
    assert!(clients[0].drain().is_empty(), "failures never broadcast");
}

#[test]
fn test_start_game_two_players_not_enough_players() {
    let mut gw = gateway();
    let (_, mut clients, _) = table(&mut gw, 2);

    gw.handle(clients[0].id, ClientMessage::StartGame);
    assert_eq!(error_code(&clients[0].drain()), Some(ErrorCode::NotEnoughPlayers));
}

#[test]
fn test_join_room_after_start_game_already_started() {
    let mut gw = gateway();
    let (room_id, mut clients, _) = table(&mut gw, 3);
    start(&mut gw, &mut clients);
    let mut late = connect(&mut gw, 9);

    gw.handle(late.id, join_msg(&room_id, "Late"));
    assert_eq!(error_code(&late.drain()), Some(ErrorCode::GameAlreadyStarted));
}

#[test]
fn test_select_card_not_key_holder_not_your_turn() {
    let mut gw = gateway();
    let (_, mut clients, _) = table(&mut gw, 3);
    start(&mut gw, &mut clients);

    gw.handle(
        clients[1].id,
        ClientMessage::SelectCard {
            target_player_id: clients[2].id,
            card_index: 0,
        },
    );
    assert_eq!(error_code(&clients[1].drain()), Some(ErrorCode::NotYourTurn));
}

#[test]
fn test_select_card_outside_room_player_not_found() {
    let mut gw = gateway();
    let mut client = connect(&mut gw, 1);

    gw.handle(
        client.id,
        ClientMessage::SelectCard {
            target_player_id: PlayerId(2),
            card_index: 0,
        },
    );
    assert_eq!(error_code(&client.drain()), Some(ErrorCode::PlayerNotFound));
}

#[test]
fn test_select_card_passes_key_to_target() {
    let mut gw = gateway();
    let (_, mut clients, _) = table(&mut gw, 3);
    let data = start(&mut gw, &mut clients);
    let (actor, target, idx) = legal_move(&data);

    gw.handle(
        actor,
        ClientMessage::SelectCard {
            target_player_id: target,
            card_index: idx,
        },
    );

    let after = last_game_data(&clients[2].drain()).unwrap();
    assert_eq!(after.cards_flipped_this_round, 1);
    let card = &after.players.iter().find(|p| p.id == target).unwrap().hand[idx];
    assert!(card.revealed);
    if after.game_state == GameState::Playing {
        assert_eq!(after.key_holder_id, Some(target));
    }
}

#[test]
fn test_full_game_reaches_finished_with_winner() {
    let mut gw = gateway();
    let (_, mut clients, _) = table(&mut gw, 4);
    let mut data = start(&mut gw, &mut clients);
    let mut rounds_seen = Vec::new();

    for _ in 0..100 {
        if data.game_state == GameState::Finished {
            break;
        }
        let (actor, target, idx) = legal_move(&data);
        gw.handle(
            actor,
            ClientMessage::SelectCard {
                target_player_id: target,
                card_index: idx,
            },
        );
        let msgs = clients[0].drain();
        assert!(error_code(&msgs).is_none(), "legal move rejected: {msgs:?}");
        for msg in &msgs {
            if let ServerMessage::RoundStart { round } = msg {
                rounds_seen.push(*round);
            }
        }
        data = last_game_data(&msgs).unwrap();
        assert!(data.cards_flipped_this_round <= 4);
    }

    assert_eq!(data.game_state, GameState::Finished);
    assert!(data.winning_team.is_some());
    assert!(data.victory_message.is_some());
    assert!(rounds_seen.windows(2).all(|w| w[1] == w[0] + 1));
    assert!(gw.registry().list_ongoing_games().is_empty());
}

#[test]
fn test_restart_game_after_finish_returns_to_waiting() {
    let mut gw = gateway();
    let (_, mut clients, _) = table(&mut gw, 3);
    start(&mut gw, &mut clients);

    gw.handle(clients[0].id, ClientMessage::RestartGame);
    assert_eq!(error_code(&clients[0].drain()), Some(ErrorCode::InvalidMove));

    // Two players drop, ending the game for lack of players.
    gw.disconnect(clients[1].id);
    gw.disconnect(clients[2].id);
    let data = last_game_data(&clients[0].drain()).unwrap();
    assert_eq!(data.game_state, GameState::Finished);
    assert_eq!(data.winning_team, None);

    gw.handle(clients[0].id, ClientMessage::RestartGame);
    let data = last_game_data(&clients[0].drain()).unwrap();
    assert_eq!(data.game_state, GameState::Waiting);
    assert!(data.players.iter().all(|p| p.role.is_none() && p.hand.is_empty()));
}

// ---------------------------------------------------------------------------
// Spectators
// ---------------------------------------------------------------------------

#[test]
fn test_spectate_room_waiting_not_playing() {
    let mut gw = gateway();
    let (room_id, _, _) = table(&mut gw, 3);
    let mut watcher = connect(&mut gw, 50);

    gw.handle(
        watcher.id,
        ClientMessage::SpectateRoom {
            room_id: room_id.as_str().into(),
            spectator_name: "Owl".into(),
        },
    );
    assert_eq!(error_code(&watcher.drain()), Some(ErrorCode::NotPlaying));
}

#[test]
fn test_spectate_room_playing_receives_updates() {
    let mut gw = gateway();
    let (room_id, mut clients, _) = table(&mut gw, 3);
    let data = start(&mut gw, &mut clients);
    let mut watcher = connect(&mut gw, 50);

    gw.handle(
        watcher.id,
        ClientMessage::SpectateRoom {
            room_id: room_id.as_str().into(),
            spectator_name: "Owl".into(),
        },
    );
    let msgs = watcher.drain();
    assert!(msgs.iter().any(|m| matches!(m, ServerMessage::SpectateSuccess { .. })));
    assert_eq!(last_game_data(&clients[0].drain()).unwrap().spectator_count, 1);

    let (actor, target, idx) = legal_move(&data);
    gw.handle(
        actor,
        ClientMessage::SelectCard {
            target_player_id: target,
            card_index: idx,
        },
    );
    assert!(last_game_data(&watcher.drain()).is_some());
}

// ---------------------------------------------------------------------------
// Seat tokens
// ---------------------------------------------------------------------------

#[test]
fn test_rejoin_room_reclaims_role_and_hand() {
    let mut gw = gateway();
    let (room_id, mut clients, tokens) = table(&mut gw, 3);
    let before = start(&mut gw, &mut clients);
    let seat = before.players[1].clone();

    gw.disconnect(clients[1].id);
    let mut back = connect(&mut gw, 20);
    gw.handle(
        back.id,
        ClientMessage::RejoinRoom {
            room_id: room_id.as_str().into(),
            session_token: tokens[1].clone(),
        },
    );

    let msgs = back.drain();
    assert!(error_code(&msgs).is_none(), "{msgs:?}");
    let data = last_game_data(&msgs).unwrap();
    let reclaimed = data.players.iter().find(|p| p.id == back.id).unwrap();
    assert!(reclaimed.connected);
    assert_eq!(reclaimed.role, seat.role);
    assert_eq!(reclaimed.hand, seat.hand);
    assert_eq!(reclaimed.name, seat.name);
    assert_eq!(gw.sessions().seat(&tokens[1]).unwrap().player_id, back.id);
}

#[test]
fn test_rejoin_room_seat_dropped_before_start_game_already_started() {
    let mut gw = gateway();
    let (room_id, mut clients, tokens) = table(&mut gw, 4);
    gw.disconnect(clients[3].id);
    let data = start(&mut gw, &mut clients[..3]);
    assert!(data.players[3].role.is_none());

    let mut back = connect(&mut gw, 20);
    gw.handle(
        back.id,
        ClientMessage::RejoinRoom {
            room_id: room_id.as_str().into(),
            session_token: tokens[3].clone(),
        },
    );

    assert_eq!(error_code(&back.drain()), Some(ErrorCode::GameAlreadyStarted));
    assert!(clients[0].drain().is_empty());
    let room = gw.registry().room(&room_id).unwrap();
    assert!(!room.players[3].connected);
    assert_eq!(room.connected_count(), 3);
    assert_eq!(gw.sessions().location(back.id), Location::Lobby);
}

#[test]
fn test_rejoin_room_unknown_token_validation_error() {
    let mut gw = gateway();
    let (room_id, _, _) = table(&mut gw, 3);
    let mut stranger = connect(&mut gw, 20);

    gw.handle(
        stranger.id,
        ClientMessage::RejoinRoom {
            room_id: room_id.as_str().into(),
            session_token: "0".repeat(32),
        },
    );
    assert_eq!(error_code(&stranger.drain()), Some(ErrorCode::ValidationError));
}

#[test]
fn test_rejoin_room_seat_still_occupied_validation_error() {
    let mut gw = gateway();
    let (room_id, _, tokens) = table(&mut gw, 3);
    let mut thief = connect(&mut gw, 20);

    gw.handle(
        thief.id,
        ClientMessage::RejoinRoom {
            room_id: room_id.as_str().into(),
            session_token: tokens[1].clone(),
        },
    );
    assert_eq!(error_code(&thief.drain()), Some(ErrorCode::ValidationError));
}

#[test]
fn test_rejoin_room_after_grace_session_expired() {
    let mut gw = gateway_with(SessionConfig {
        reconnect_grace_secs: 0,
        ..SessionConfig::default()
    });
    let (room_id, clients, tokens) = table(&mut gw, 3);

    gw.disconnect(clients[1].id);
    let mut back = connect(&mut gw, 20);
    gw.handle_at(
        back.id,
        ClientMessage::RejoinRoom {
            room_id: room_id.as_str().into(),
            session_token: tokens[1].clone(),
        },
        Instant::now() + Duration::from_secs(1),
    );
    assert_eq!(error_code(&back.drain()), Some(ErrorCode::SessionExpired));
}

// ---------------------------------------------------------------------------
// Chat, lobby queries, heartbeat
// ---------------------------------------------------------------------------

#[test]
fn test_send_chat_broadcasts_history() {
    let mut gw = gateway();
    let (_, mut clients, _) = table(&mut gw, 3);

    gw.handle(clients[1].id, ClientMessage::SendChat { text: "  oink  ".into() });

    let msgs = clients[2].drain();
    let history = msgs
        .iter()
        .find_map(|m| match m {
            ServerMessage::NewMessage { history } => Some(history.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].text, "oink");
    assert_eq!(history[0].player_name, "Bo");
    assert_eq!(history[0].player_id, clients[1].id);
}

#[test]
fn test_send_chat_burst_exceeded_rate_limited() {
    let mut gw = gateway();
    let (_, mut clients, _) = table(&mut gw, 3);
    let now = Instant::now();

    for i in 0..5 {
        gw.handle_at(clients[0].id, ClientMessage::SendChat { text: format!("line {i}") }, now);
    }
    assert!(error_code(&clients[0].drain()).is_none());

    gw.handle_at(clients[0].id, ClientMessage::SendChat { text: "one more".into() }, now);
    assert_eq!(error_code(&clients[0].drain()), Some(ErrorCode::RateLimited));
    assert!(clients[1].drain().len() == 5, "rejected line not broadcast");
}

#[test]
fn test_send_chat_spectator_rejected() {
    let mut gw = gateway();
    let (room_id, mut clients, _) = table(&mut gw, 3);
    start(&mut gw, &mut clients);
    let mut watcher = connect(&mut gw, 50);
    gw.handle(
        watcher.id,
        ClientMessage::SpectateRoom {
            room_id: room_id.as_str().into(),
            spectator_name: "Owl".into(),
        },
    );
    watcher.drain();

    gw.handle(watcher.id, ClientMessage::SendChat { text: "hi".into() });
    assert_eq!(error_code(&watcher.drain()), Some(ErrorCode::ValidationError));
}

#[test]
fn test_send_chat_too_long_validation_error() {
    let mut gw = gateway();
    let (_, mut clients, _) = table(&mut gw, 3);

    gw.handle(clients[0].id, ClientMessage::SendChat { text: "x".repeat(101) });
    assert_eq!(error_code(&clients[0].drain()), Some(ErrorCode::ValidationError));
}

#[test]
fn test_get_room_list_replies_to_caller_only() {
    let mut gw = gateway();
    let (room_id, mut clients, _) = table(&mut gw, 3);

    gw.handle(clients[0].id, ClientMessage::GetRoomList);

    let msgs = clients[0].drain();
    assert_eq!(msgs.len(), 1);
    match &msgs[0] {
        ServerMessage::RoomList { rooms } => {
            assert_eq!(rooms.len(), 1);
            assert_eq!(rooms[0].id, room_id);
            assert_eq!(rooms[0].player_count, 3);
            assert_eq!(rooms[0].host_name, "Mimi");
        }
        other => panic!("expected roomList, got {other:?}"),
    }
    assert!(clients[1].drain().is_empty());
}

#[test]
fn test_get_ongoing_games_lists_started_rooms() {
    let mut gw = gateway();
    let (room_id, mut clients, _) = table(&mut gw, 3);
    start(&mut gw, &mut clients);

    gw.handle(clients[1].id, ClientMessage::GetOngoingGames);

    match clients[1].drain().as_slice() {
        [ServerMessage::OngoingGames { games }] => {
            assert_eq!(games.len(), 1);
            assert_eq!(games[0].id, room_id);
            assert_eq!(games[0].current_round, 1);
        }
        other => panic!("expected ongoingGames, got {other:?}"),
    }
}

#[test]
fn test_heartbeat_echoes_client_time() {
    let mut gw = gateway();
    let mut client = connect(&mut gw, 1);

    gw.handle(client.id, ClientMessage::Heartbeat { client_time: 12345 });

    match client.drain().as_slice() {
        [ServerMessage::HeartbeatAck { client_time, .. }] => assert_eq!(*client_time, 12345),
        other => panic!("expected heartbeatAck, got {other:?}"),
    }
}

#[test]
fn test_reject_frame_malformed_json_validation_error() {
    let mut gw = gateway();
    let mut client = connect(&mut gw, 1);
    let err = JsonCodec
        .decode::<ClientMessage>(br#"{"type":"flyAway"}"#)
        .unwrap_err();

    gw.reject_frame(client.id, &err);
    assert_eq!(error_code(&client.drain()), Some(ErrorCode::ValidationError));
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

#[test]
fn test_sweep_idle_connection_dropped() {
    let mut gw = gateway();
    let mut client = connect(&mut gw, 1);
    let (room_id, _) = create(&mut gw, &mut client, "Mimi");

    let report = gw.sweep(Instant::now() + Duration::from_secs(31 * 60), Duration::from_secs(3600));

    assert_eq!(report.idle_connections, 1);
    assert_eq!(gw.connection_count(), 0);
    assert!(gw.registry().room(&room_id).is_none());
    assert_eq!(client.rx.try_recv(), Err(TryRecvError::Disconnected));
}

#[test]
fn test_sweep_inactive_room_sends_room_closed() {
    let mut gw = gateway();
    let mut client = connect(&mut gw, 1);
    let (room_id, token) = create(&mut gw, &mut client, "Mimi");

    let report = gw.sweep(Instant::now(), Duration::ZERO);

    assert_eq!(report.closed_rooms, 1);
    assert!(client.drain().contains(&ServerMessage::RoomClosed { room_id }));
    assert_eq!(gw.sessions().location(client.id), Location::Lobby);
    assert!(gw.sessions().seat(&token).is_none());
}

#[test]
fn test_sweep_expires_vacated_seats() {
    let mut gw = gateway_with(SessionConfig {
        reconnect_grace_secs: 10,
        ..SessionConfig::default()
    });
    let (_, clients, tokens) = table(&mut gw, 3);
    gw.disconnect(clients[2].id);

    let report = gw.sweep(Instant::now() + Duration::from_secs(60), Duration::from_secs(3600));

    assert_eq!(report.expired_seats, 1);
    assert!(gw.sessions().seat(&tokens[2]).is_none());
    assert!(gw.sessions().seat(&tokens[0]).is_some());
}

#[test]
fn test_sweep_expired_seat_in_waiting_room_frees_name() {
    let mut gw = gateway_with(SessionConfig {
        reconnect_grace_secs: 10,
        ..SessionConfig::default()
    });
    let (room_id, mut clients, _) = table(&mut gw, 3);
    gw.disconnect(clients[2].id);
    clients[0].drain();

    gw.sweep(Instant::now() + Duration::from_secs(60), Duration::from_secs(3600));

    let data = last_game_data(&clients[0].drain()).expect("gameUpdate after seat removal");
    assert_eq!(data.players.len(), 2);
    assert!(data.players.iter().all(|p| p.connected));

    let mut newcomer = connect(&mut gw, 20);
    join(&mut gw, &mut newcomer, &room_id, "Pip");
    assert_eq!(gw.registry().room(&room_id).unwrap().players.len(), 3);
}

#[test]
fn test_sweep_expired_seat_in_started_game_kept_until_restart() {
    let mut gw = gateway_with(SessionConfig {
        reconnect_grace_secs: 10,
        ..SessionConfig::default()
    });
    let (room_id, mut clients, _) = table(&mut gw, 4);
    start(&mut gw, &mut clients);
    gw.disconnect(clients[3].id);

    let report = gw.sweep(Instant::now() + Duration::from_secs(60), Duration::from_secs(3600));
    assert_eq!(report.expired_seats, 1);
    assert_eq!(gw.registry().room(&room_id).unwrap().players.len(), 4);

    gw.disconnect(clients[1].id);
    gw.disconnect(clients[2].id);
    clients[0].drain();
    gw.handle(clients[0].id, ClientMessage::RestartGame);

    let data = last_game_data(&clients[0].drain()).unwrap();
    assert_eq!(data.game_state, GameState::Waiting);
    let ids: Vec<PlayerId> = data.players.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![clients[0].id, clients[1].id, clients[2].id]);
}
