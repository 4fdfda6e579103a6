//! Drives a live server over real WebSocket connections.

use std::sync::Arc;
use std::time::Duration;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use tic_tac_toe::network::protocol::{ErrorCode, ServerMessage, INVALID_USERNAME};
use tic_tac_toe::{GameServer, Mark, ServerConfig, Username};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> (Arc<GameServer>, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(GameServer::new(ServerConfig {
        bind_addr: addr,
        auth_timeout: Duration::from_secs(2),
        ..Default::default()
    }));

    let running = server.clone();
    tokio::spawn(async move { running.serve(listener).await });

    (server, format!("ws://{}", addr))
}

async fn send(ws: &mut Client, value: serde_json::Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

async fn connect(url: &str, username: &str) -> Client {
    let (mut ws, _) = connect_async(url).await.unwrap();
    send(&mut ws, json!({"event": "auth", "data": {"username": username}})).await;
    ws
}

async fn next_event(ws: &mut Client) -> ServerMessage {
    loop {
        let frame = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            return ServerMessage::from_json(&text).unwrap();
        }
    }
}

fn host_names(msg: &ServerMessage) -> Vec<String> {
    match msg {
        ServerMessage::UpdateHosts(list) => {
            list.hosts.iter().map(|h| h.host_name.to_string()).collect()
        }
        other => panic!("expected update hosts, got {:?}", other),
    }
}

/// Alice hosts, Bob joins. Both mailboxes are drained up to the first snapshot.
async fn paired(url: &str) -> (Client, Client) {
    let mut alice = connect(url, "alice").await;
    assert!(host_names(&next_event(&mut alice).await).is_empty());

    send(&mut alice, json!({"event": "host game", "data": {"tags": ["casual"]}})).await;
    assert_eq!(host_names(&next_event(&mut alice).await), vec!["alice"]);

    let mut bob = connect(url, "bob").await;
    assert_eq!(host_names(&next_event(&mut bob).await), vec!["alice"]);

    send(&mut bob, json!({"event": "join game", "data": {"hostName": "alice"}})).await;
    for ws in [&mut alice, &mut bob] {
        assert!(host_names(&next_event(ws).await).is_empty());
        assert!(matches!(next_event(ws).await, ServerMessage::GameUpdate(_)));
    }

    (alice, bob)
}

#[tokio::test]
async fn test_admission_sends_host_list() {
    let (server, url) = start_server().await;
    let mut alice = connect(&url, "alice").await;

    assert!(host_names(&next_event(&mut alice).await).is_empty());
    assert_eq!(server.connection_count().await, 1);
}

#[tokio::test]
async fn test_duplicate_username_rejected() {
    let (server, url) = start_server().await;
    let mut first = connect(&url, "alice").await;
    next_event(&mut first).await;

    let mut second = connect(&url, "alice").await;
    match next_event(&mut second).await {
        ServerMessage::ConnectError(err) => assert_eq!(err.message, INVALID_USERNAME),
        other => panic!("expected connect_error, got {:?}", other),
    }

    let close = timeout(Duration::from_secs(2), second.next()).await.unwrap();
    match close {
        Some(Ok(Message::Close(Some(frame)))) => assert_eq!(frame.code, CloseCode::Policy),
        Some(Ok(Message::Close(None))) | None | Some(Err(_)) => {}
        Some(Ok(other)) => panic!("expected close, got {:?}", other),
    }

    // The first connection keeps its name.
    assert_eq!(server.connection_count().await, 1);
}

#[tokio::test]
async fn test_missing_username_rejected() {
    let (_server, url) = start_server().await;
    let (mut ws, _) = connect_async(url.as_str()).await.unwrap();
    send(&mut ws, json!({"event": "auth", "data": {}})).await;

    assert!(matches!(next_event(&mut ws).await, ServerMessage::ConnectError(_)));
}

#[tokio::test]
async fn test_host_join_and_move() {
    let (server, url) = start_server().await;
    let (mut alice, mut bob) = paired(&url).await;
    assert_eq!(server.session_count().await, 1);
    assert_eq!(server.host_count().await, 0);

    send(&mut alice, json!({"event": "move", "data": {"x": 1, "y": 0, "value": "x"}})).await;

    for ws in [&mut alice, &mut bob] {
        match next_event(ws).await {
            ServerMessage::GameUpdate(snapshot) => {
                assert_eq!(snapshot.moves.get(0, 1), Some(Mark::X));
                assert_eq!(snapshot.blocked_user, Username::from("alice"));
                assert_eq!(snapshot.host_player, Username::from("alice"));
                assert_eq!(snapshot.joined_player, Username::from("bob"));
            }
            other => panic!("expected game update, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_opponent_leaving_is_announced() {
    let (server, url) = start_server().await;
    let (alice, mut bob) = paired(&url).await;

    drop(alice);

    match next_event(&mut bob).await {
        ServerMessage::AnotherLeaveGame(left) => assert_eq!(left.username, Username::from("alice")),
        other => panic!("expected another leave game, got {:?}", other),
    }
    assert_eq!(server.session_count().await, 0);
}

#[tokio::test]
async fn test_stop_host_without_payload() {
    let (server, url) = start_server().await;
    let mut alice = connect(&url, "alice").await;
    next_event(&mut alice).await;

    send(&mut alice, json!({"event": "host game", "data": {"tags": null}})).await;
    assert_eq!(host_names(&next_event(&mut alice).await), vec!["alice"]);

    send(&mut alice, json!({"event": "stop host"})).await;
    assert!(host_names(&next_event(&mut alice).await).is_empty());
    assert_eq!(server.host_count().await, 0);
}

#[tokio::test]
async fn test_malformed_frame_reports_error() {
    let (server, url) = start_server().await;
    let mut alice = connect(&url, "alice").await;
    next_event(&mut alice).await;

    alice.send(Message::Text("not json".to_string())).await.unwrap();

    match next_event(&mut alice).await {
        ServerMessage::Error(err) => assert_eq!(err.code, ErrorCode::InvalidInput),
        other => panic!("expected error, got {:?}", other),
    }
    assert_eq!(server.connection_count().await, 1);
}
