//! End-to-end tests over real sockets.
//!
//! Each test binds a server on an ephemeral port, connects WebSocket clients
//! with tokio-tungstenite and shuts the server down through `run_until`.

use std::{net::SocketAddr, time::Duration};

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tether_core::RoomSecret;
use tether_proto::{ClientMessage, ServerMessage};
use tether_server::{RelayConfig, Server, ServerError, ServerRuntimeConfig};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::oneshot,
    task::JoinHandle,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SECRET: &str = "wire-secret";
const TIMEOUT: Duration = Duration::from_secs(5);

struct Running {
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), ServerError>>,
}

impl Running {
    async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(TIMEOUT, self.task).await.unwrap().unwrap().unwrap();
    }
}

async fn start() -> Running {
    let config = ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_string(),
        driver: RelayConfig { room_secret: RoomSecret::new(SECRET), ..Default::default() },
    };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.run_until(async move {
        let _ = stopped.await;
    }));

    Running { addr, stop: Some(stop), task }
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}{path}")).await.unwrap();
    ws
}

async fn send(ws: &mut Client, message: &ClientMessage) {
    ws.send(Message::text(message.encode().unwrap())).await.unwrap();
}

async fn recv(ws: &mut Client) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = frame {
            return ServerMessage::decode(text.as_str()).unwrap();
        }
    }
}

fn join(controller: bool) -> ClientMessage {
    let room_code = SECRET.to_string();
    if controller {
        ClientMessage::ControllerJoin { room_code }
    } else {
        ClientMessage::TargetJoin { room_code }
    }
}

#[tokio::test]
async fn relay_over_websockets() {
    let server = start().await;
    let mut controller = connect(server.addr, "/").await;
    let mut target = connect(server.addr, "/ws").await;

    send(&mut controller, &join(true)).await;
    assert_eq!(recv(&mut controller).await, ServerMessage::target_count(0));
    assert_eq!(recv(&mut controller).await, ServerMessage::waiting_for_target());

    send(&mut target, &join(false)).await;
    assert_eq!(recv(&mut target).await, ServerMessage::connected());
    assert_eq!(recv(&mut controller).await, ServerMessage::target_count(1));
    assert_eq!(recv(&mut controller).await, ServerMessage::target_acquired(1));

    let payload = json!({"type": "X", "n": [1, 2, 3]});
    send(&mut controller, &ClientMessage::RelayMessage { payload: payload.clone() }).await;
    assert_eq!(recv(&mut target).await, ServerMessage::relayed(payload));
    assert_eq!(recv(&mut controller).await, ServerMessage::delivery_receipt(1, 1));

    target.close(None).await.unwrap();
    assert_eq!(recv(&mut controller).await, ServerMessage::target_count(0));
    assert_eq!(recv(&mut controller).await, ServerMessage::target_lost());

    server.shutdown().await;
}

#[tokio::test]
async fn ping_and_rejections_keep_socket_open() {
    let server = start().await;
    let mut client = connect(server.addr, "/ws").await;

    send(&mut client, &ClientMessage::Ping).await;
    assert_eq!(recv(&mut client).await, ServerMessage::Pong);

    client.send(Message::text("not json")).await.unwrap();
    send(&mut client, &ClientMessage::TargetJoin { room_code: "nope".to_string() }).await;
    assert_eq!(recv(&mut client).await, ServerMessage::error("Invalid room code"));

    send(&mut client, &ClientMessage::RelayMessage { payload: json!(1) }).await;
    assert_eq!(recv(&mut client).await, ServerMessage::error("Only controllers may relay messages"));

    send(&mut client, &ClientMessage::Ping).await;
    assert_eq!(recv(&mut client).await, ServerMessage::Pong);

    server.shutdown().await;
}

#[tokio::test]
async fn binary_frames_are_ignored() {
    let server = start().await;
    let mut client = connect(server.addr, "/ws").await;

    client.send(Message::binary(vec![0x7b, 0x00, 0xff, 0xfe])).await.unwrap();
    client.send(Message::binary(br#"{"type":"ping"}"#.to_vec())).await.unwrap();
    send(&mut client, &ClientMessage::Ping).await;

    assert_eq!(recv(&mut client).await, ServerMessage::Pong);
    send(&mut client, &join(false)).await;
    assert_eq!(recv(&mut client).await, ServerMessage::connected());

    server.shutdown().await;
}

#[tokio::test]
async fn controller_disconnect_notifies_target() {
    let server = start().await;
    let mut controller = connect(server.addr, "/ws").await;
    let mut target = connect(server.addr, "/ws").await;

    send(&mut target, &join(false)).await;
    assert_eq!(recv(&mut target).await, ServerMessage::connected());
    send(&mut controller, &join(true)).await;
    assert_eq!(recv(&mut controller).await, ServerMessage::target_count(1));

    drop(controller);
    assert_eq!(recv(&mut target).await, ServerMessage::controller_disconnected());

    server.shutdown().await;
}

#[tokio::test]
async fn health_reports_rooms_and_connections() {
    let server = start().await;
    let mut controller = connect(server.addr, "/ws").await;
    send(&mut controller, &join(true)).await;
    recv(&mut controller).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(TIMEOUT, stream.read_to_end(&mut response)).await.unwrap().unwrap();

    let response = String::from_utf8(response).unwrap();
    assert!(response.starts_with("HTTP/1.1 200"), "unexpected response: {response}");
    let (_, body) = response.split_once("\r\n\r\n").unwrap();
    let status: Value = serde_json::from_str(body).unwrap();

    assert_eq!(status["status"], "online");
    assert_eq!(status["rooms"], 1);
    assert_eq!(status["connections"], 1);
    assert!(status["timestamp"].as_u64().unwrap() > 0);

    server.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_live_sockets() {
    let server = start().await;
    let mut client = connect(server.addr, "/ws").await;
    send(&mut client, &ClientMessage::Ping).await;
    assert_eq!(recv(&mut client).await, ServerMessage::Pong);

    let closed = async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(frame))) => break frame.map(|f| f.reason.as_str().to_owned()),
                Some(Ok(_)) => {},
                _ => break None,
            }
        }
    };
    let (reason, ()) = tokio::join!(tokio::time::timeout(TIMEOUT, closed), server.shutdown());

    assert_eq!(reason.unwrap().as_deref(), Some("server shutting down"));
}

#[tokio::test]
async fn bind_rejects_empty_secret() {
    let config = ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_string(),
        driver: RelayConfig::default(),
    };

    assert!(matches!(Server::bind(config).await, Err(ServerError::Config(_))));
}

#[tokio::test]
async fn bind_rejects_bad_address() {
    let config = ServerRuntimeConfig {
        bind_address: "not an address".to_string(),
        driver: RelayConfig { room_secret: RoomSecret::new(SECRET), ..Default::default() },
    };

    assert!(matches!(Server::bind(config).await, Err(ServerError::Config(_))));
}
