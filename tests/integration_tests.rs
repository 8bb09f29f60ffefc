//! Integration tests for the networked multiplayer server
//!
//! These tests start the real WebSocket server on an ephemeral port and talk
//! to it with ordinary WebSocket clients.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use server::game::{GameConfig, GameState};
use server::gateway::Gateway;
use server::network::{Server, HANDSHAKE_TIMEOUT};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SEED: u32 = 42;
const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const SILENCE: Duration = Duration::from_millis(200);

async fn start_server(config: GameConfig) -> SocketAddr {
    start_server_with_handshake_timeout(config, HANDSHAKE_TIMEOUT).await
}

async fn start_server_with_handshake_timeout(config: GameConfig, handshake_timeout: Duration) -> SocketAddr {
    let tick_duration = config.tick_duration();
    let gateway = Gateway::new(GameState::new(config, SEED));
    let server = Server::bind("127.0.0.1:0", gateway, tick_duration)
        .await
        .expect("Failed to bind server")
        .with_handshake_timeout(handshake_timeout);
    let addr = server.local_addr().expect("No local address");

    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

async fn open(addr: SocketAddr, handshake: Value) -> Ws {
    let (mut ws, _) = connect_async(format!("ws://{}", addr))
        .await
        .expect("Failed to connect");
    ws.send(Message::Text(handshake.to_string())).await.unwrap();
    ws
}

/// Connects and consumes the `init` message.
async fn join(addr: SocketAddr, player_id: &str) -> (Ws, Value) {
    let mut ws = open(
        addr,
        json!({"playerId": player_id, "playerName": format!("Driver {}", player_id)}),
    )
    .await;
    let init = recv(&mut ws).await;
    assert_eq!(init["type"], "init");
    (ws, init)
}

async fn send(ws: &mut Ws, message: Value) {
    ws.send(Message::Text(message.to_string())).await.unwrap();
}

async fn recv(ws: &mut Ws) -> Value {
    loop {
        let frame = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("Timed out waiting for a message")
            .expect("Connection ended")
            .expect("WebSocket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Reads until a message of the given type arrives.
async fn recv_type(ws: &mut Ws, message_type: &str) -> Value {
    loop {
        let message = recv(ws).await;
        if message["type"] == message_type {
            return message;
        }
    }
}

async fn assert_silent(ws: &mut Ws) {
    if let Ok(message) = timeout(SILENCE, recv(ws)).await {
        panic!("Unexpected message: {}", message);
    }
}

/// Waits for the server to close the connection, skipping queued messages.
async fn assert_closed(ws: &mut Ws) {
    loop {
        match timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("Timed out waiting for close")
        {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(_)) => continue,
        }
    }
}

/// HANDSHAKE TESTS
mod handshake_tests {
    use super::*;

    #[tokio::test]
    async fn init_carries_state_and_seed() {
        let addr = start_server(GameConfig::default()).await;
        let mut ws = open(
            addr,
            json!({"playerId": "alice", "playerName": "Alice", "vehicleType": "sports"}),
        )
        .await;

        let init = recv(&mut ws).await;
        assert_eq!(init["type"], "init");
        assert_eq!(init["playerId"], "alice");
        assert_eq!(init["worldSeed"], SEED);
        assert_eq!(init["gameState"]["playerCount"], 1);
        assert_eq!(init["gameState"]["players"]["alice"]["name"], "Alice");
        assert_eq!(init["gameState"]["players"]["alice"]["vehicleType"], "sports");
    }

    #[tokio::test]
    async fn missing_fields_are_defaulted() {
        let addr = start_server(GameConfig::default()).await;
        let mut ws = open(addr, json!({"vehicleType": "hovercraft"})).await;

        let init = recv(&mut ws).await;
        let player_id = init["playerId"].as_str().unwrap().to_string();
        assert!(player_id.starts_with("player_"));

        let player = &init["gameState"]["players"][player_id.as_str()];
        assert!(player["name"].as_str().unwrap().starts_with("Player "));
        assert_eq!(player["vehicleType"], "default");
    }

    #[tokio::test]
    async fn others_see_player_joined_at_spawn_ring() {
        let addr = start_server(GameConfig::default()).await;
        let (mut a, _) = join(addr, "a").await;
        let (_b, init_b) = join(addr, "b").await;

        assert_eq!(init_b["gameState"]["playerCount"], 2);

        let joined = recv(&mut a).await;
        assert_eq!(joined["type"], "playerJoined");
        assert_eq!(joined["playerId"], "b");
        assert_eq!(joined["playerName"], "Driver b");
        assert_eq!(joined["vehicleType"], "default");

        let x = joined["position"]["x"].as_f64().unwrap();
        let y = joined["position"]["y"].as_f64().unwrap();
        let z = joined["position"]["z"].as_f64().unwrap();
        assert!(((x * x + z * z).sqrt() - 20.0).abs() < 1e-3);
        assert!((y - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn server_full_closes_connection() {
        let config = GameConfig {
            max_players: 1,
            ..GameConfig::default()
        };
        let addr = start_server(config).await;
        let (mut a, _) = join(addr, "a").await;

        let mut rejected = open(addr, json!({"playerId": "b"})).await;
        assert_closed(&mut rejected).await;
        assert_silent(&mut a).await;
    }

    #[tokio::test]
    async fn silent_connection_is_dropped_after_handshake_timeout() {
        let addr =
            start_server_with_handshake_timeout(GameConfig::default(), Duration::from_millis(200)).await;

        // Upgraded but never sends a handshake
        let (mut idle, _) = connect_async(format!("ws://{}", addr))
            .await
            .expect("Failed to connect");
        assert_closed(&mut idle).await;

        // Never even starts the WebSocket upgrade
        let mut raw = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 64];
        let read = timeout(RECV_TIMEOUT, raw.read(&mut buf))
            .await
            .expect("Timed out waiting for the server to hang up");
        assert!(matches!(read, Ok(0) | Err(_)));

        // Prompt clients are unaffected
        let (_ws, init) = join(addr, "a").await;
        assert_eq!(init["playerId"], "a");
    }
}

/// MESSAGE ROUTING TESTS
mod routing_tests {
    use super::*;

    #[tokio::test]
    async fn position_is_relayed_but_not_echoed() {
        let addr = start_server(GameConfig::default()).await;
        let (mut a, _) = join(addr, "a").await;
        let (mut b, _) = join(addr, "b").await;
        let (mut c, _) = join(addr, "c").await;
        recv_type(&mut a, "playerJoined").await;
        recv_type(&mut a, "playerJoined").await;
        recv_type(&mut b, "playerJoined").await;

        send(
            &mut a,
            json!({
                "type": "position",
                "position": {"x": 10.0, "y": 1.0, "z": -4.0},
                "rotation": {"x": 0.0, "y": 1.5, "z": 0.0},
                "velocity": {"x": 3.0, "y": 0.0, "z": 0.0}
            }),
        )
        .await;

        for ws in [&mut b, &mut c] {
            let update = recv(ws).await;
            assert_eq!(update["type"], "playerPosition");
            assert_eq!(update["playerId"], "a");
            assert_eq!(update["position"], json!({"x": 10.0, "y": 1.0, "z": -4.0}));
            assert_eq!(update["velocity"], json!({"x": 3.0, "y": 0.0, "z": 0.0}));
        }
        assert_silent(&mut a).await;
    }

    #[tokio::test]
    async fn chat_reaches_sender_too() {
        let addr = start_server(GameConfig::default()).await;
        let (mut a, _) = join(addr, "a").await;
        let (mut b, _) = join(addr, "b").await;
        recv_type(&mut a, "playerJoined").await;

        send(&mut b, json!({"type": "chat", "message": "hello"})).await;

        let expected = json!({
            "type": "chat",
            "playerId": "b",
            "playerName": "Driver b",
            "message": "hello"
        });
        assert_eq!(recv(&mut a).await, expected);
        assert_eq!(recv(&mut b).await, expected);
    }

    #[tokio::test]
    async fn ping_is_answered_privately() {
        let addr = start_server(GameConfig::default()).await;
        let (mut a, _) = join(addr, "a").await;
        let (mut b, _) = join(addr, "b").await;
        recv_type(&mut a, "playerJoined").await;

        send(&mut b, json!({"type": "ping", "timestamp": 1700000000123.0})).await;

        let pong = recv(&mut b).await;
        assert_eq!(pong["type"], "pong");
        assert_eq!(pong["timestamp"], 1700000000123.0);
        assert_silent(&mut a).await;
    }

    #[tokio::test]
    async fn unknown_type_keeps_connection_open() {
        let addr = start_server(GameConfig::default()).await;
        let (mut a, _) = join(addr, "a").await;

        send(&mut a, json!({"type": "honk", "volume": 11})).await;
        send(&mut a, json!({"type": "ping", "timestamp": 1.0})).await;

        let pong = recv(&mut a).await;
        assert_eq!(pong["type"], "pong");
    }

    #[tokio::test]
    async fn chunk_request_returns_geometry() {
        let addr = start_server(GameConfig::default()).await;
        let (mut a, _) = join(addr, "a").await;
        let (mut b, _) = join(addr, "b").await;
        recv_type(&mut a, "playerJoined").await;

        send(&mut a, json!({"type": "requestChunk", "chunkX": 0, "chunkZ": 0})).await;

        let reply = recv(&mut a).await;
        assert_eq!(reply["type"], "chunk");
        assert_eq!(reply["chunkX"], 0);
        assert_eq!(reply["chunkZ"], 0);
        let chunk = &reply["chunk"];
        assert_eq!(chunk["heightmap"].as_array().unwrap().len(), 17);
        assert_eq!(chunk["vertices"].as_array().unwrap().len(), 289);
        assert_eq!(chunk["indices"].as_array().unwrap().len(), 1536);
        assert_silent(&mut b).await;
    }

    #[tokio::test]
    async fn checkpoint_lap_is_announced() {
        let addr = start_server(GameConfig::default()).await;
        let (mut a, _) = join(addr, "a").await;
        let (mut b, _) = join(addr, "b").await;
        recv_type(&mut a, "playerJoined").await;

        for checkpoint_id in [0, 1, 2, 0] {
            send(&mut b, json!({"type": "checkpoint", "checkpointId": checkpoint_id})).await;
        }

        for ws in [&mut a, &mut b] {
            let lap = recv(ws).await;
            assert_eq!(lap["type"], "lapCompleted");
            assert_eq!(lap["playerId"], "b");
            assert!(lap["lapTime"].as_f64().unwrap() >= 0.0);
            assert_eq!(lap["lapTime"], lap["bestLapTime"]);
        }
    }
}

/// DISCONNECT AND ERROR HANDLING TESTS
mod teardown_tests {
    use super::*;

    #[tokio::test]
    async fn closing_broadcasts_player_left() {
        let addr = start_server(GameConfig::default()).await;
        let (mut a, _) = join(addr, "a").await;
        let (mut b, _) = join(addr, "b").await;
        recv_type(&mut a, "playerJoined").await;

        a.close(None).await.unwrap();

        assert_eq!(
            recv(&mut b).await,
            json!({"type": "playerLeft", "playerId": "a"})
        );
        assert_silent(&mut b).await;
    }

    #[tokio::test]
    async fn malformed_frame_drops_connection() {
        let addr = start_server(GameConfig::default()).await;
        let (mut a, _) = join(addr, "a").await;
        let (mut b, _) = join(addr, "b").await;
        recv_type(&mut a, "playerJoined").await;

        a.send(Message::Text("{not json".to_string())).await.unwrap();

        assert_closed(&mut a).await;
        assert_eq!(
            recv(&mut b).await,
            json!({"type": "playerLeft", "playerId": "a"})
        );
    }

    #[tokio::test]
    async fn reconnect_replaces_old_session() {
        let addr = start_server(GameConfig::default()).await;
        let (mut old, _) = join(addr, "a").await;
        let (mut b, _) = join(addr, "b").await;
        recv_type(&mut old, "playerJoined").await;

        let (_new, init) = join(addr, "a").await;
        assert_eq!(init["gameState"]["playerCount"], 2);

        assert_eq!(
            recv(&mut b).await,
            json!({"type": "playerLeft", "playerId": "a"})
        );
        let joined = recv(&mut b).await;
        assert_eq!(joined["type"], "playerJoined");
        assert_eq!(joined["playerId"], "a");

        assert_closed(&mut old).await;
        assert_silent(&mut b).await;
    }

    #[tokio::test]
    async fn idle_player_is_evicted() {
        let config = GameConfig {
            player_timeout: Duration::from_millis(500),
            ..GameConfig::default()
        };
        let addr = start_server(config).await;
        let (mut idle, _) = join(addr, "idle").await;
        let (mut active, _) = join(addr, "active").await;

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut left = None;
        while Instant::now() < deadline {
            send(&mut active, json!({"type": "ping", "timestamp": 0.0})).await;
            if let Ok(message) = timeout(Duration::from_millis(100), recv(&mut active)).await {
                if message["type"] == "playerLeft" {
                    left = Some(message);
                    break;
                }
            }
            sleep(Duration::from_millis(50)).await;
        }

        assert_eq!(left, Some(json!({"type": "playerLeft", "playerId": "idle"})));
        assert_closed(&mut idle).await;
    }
}
