//! End-to-end tests: a real server on an ephemeral port, driven by
//! `tokio-tungstenite` clients speaking JSON.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pighouse::PighouseServer;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Starts a server on port 0 and returns its `ws://` URL.
async fn spawn_server() -> String {
    let server = PighouseServer::builder()
        .bind("127.0.0.1:0")
        .seed(7)
        .build()
        .await
        .expect("server should bind");
    let addr = server.local_addr().expect("bound address");
    tokio::spawn(server.run());
    format!("ws://{addr}")
}

async fn connect(url: &str) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("client should connect");
    ws
}

async fn send(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send should succeed");
}

/// Next JSON frame, failing the test after two seconds.
async fn next_json(ws: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("frame within timeout")
            .expect("stream open")
            .expect("valid frame");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("server sends JSON");
        }
    }
}

/// Skips frames until one with the given `type` arrives.
async fn next_of_type(ws: &mut Client, kind: &str) -> Value {
    loop {
        let value = next_json(ws).await;
        if value["type"] == kind {
            return value;
        }
    }
}

#[tokio::test]
async fn test_connect_receives_connected_frame() {
    let url = spawn_server().await;
    let mut ws = connect(&url).await;

    let hello = next_json(&mut ws).await;
    assert_eq!(hello["type"], "connected");
    assert!(hello["playerId"].as_u64().is_some());
}

#[tokio::test]
async fn test_create_room_over_websocket() {
    let url = spawn_server().await;
    let mut ws = connect(&url).await;
    let hello = next_json(&mut ws).await;

    send(&mut ws, json!({"type": "createRoom", "playerName": "Mimi"})).await;
    let created = next_of_type(&mut ws, "roomCreated").await;

    assert_eq!(created["isHost"], true);
    assert_eq!(created["sessionToken"].as_str().map(str::len), Some(32));
    assert_eq!(created["gameData"]["gameState"], "waiting");
    assert_eq!(created["gameData"]["hostId"], hello["playerId"]);
    assert_eq!(created["roomId"].as_str().map(str::len), Some(6));
}

#[tokio::test]
async fn test_join_room_second_client_sees_update() {
    let url = spawn_server().await;
    let mut host = connect(&url).await;
    let mut guest = connect(&url).await;
    next_json(&mut host).await;
    next_json(&mut guest).await;

    send(&mut host, json!({"type": "createRoom", "playerName": "Mimi"})).await;
    let created = next_of_type(&mut host, "roomCreated").await;
    let room_id = created["roomId"].as_str().unwrap().to_string();

    send(
        &mut guest,
        json!({"type": "joinRoom", "roomId": room_id, "playerName": "Bo"}),
    )
    .await;
    let joined = next_of_type(&mut guest, "roomJoined").await;
    assert_eq!(joined["isHost"], false);

    let update = next_of_type(&mut host, "gameUpdate").await;
    assert_eq!(update["gameData"]["players"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_malformed_frame_gets_validation_error_and_connection_survives() {
    let url = spawn_server().await;
    let mut ws = connect(&url).await;
    next_json(&mut ws).await;

    ws.send(Message::Text("not json".into())).await.unwrap();
    let err = next_of_type(&mut ws, "error").await;
    assert_eq!(err["code"], "VALIDATION_ERROR");

    send(&mut ws, json!({"type": "heartbeat", "clientTime": 99})).await;
    let ack = next_of_type(&mut ws, "heartbeatAck").await;
    assert_eq!(ack["clientTime"], 99);
}

#[tokio::test]
async fn test_client_close_host_changes_for_remaining_player() {
    let url = spawn_server().await;
    let mut host = connect(&url).await;
    let mut guest = connect(&url).await;
    next_json(&mut host).await;
    let guest_hello = next_json(&mut guest).await;

    send(&mut host, json!({"type": "createRoom", "playerName": "Mimi"})).await;
    let created = next_of_type(&mut host, "roomCreated").await;
    send(
        &mut guest,
        json!({"type": "joinRoom", "roomId": created["roomId"], "playerName": "Bo"}),
    )
    .await;
    next_of_type(&mut guest, "roomJoined").await;

    host.close(None).await.unwrap();

    let changed = next_of_type(&mut guest, "hostChanged").await;
    assert_eq!(changed["newHostId"], guest_hello["playerId"]);
}
