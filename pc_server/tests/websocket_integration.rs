//! WebSocket integration tests.
//!
//! Each test drives a real server on an ephemeral port. Some tests mix in a
//! raw TCP client to check that both transports behave the same.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use pc_server::{
    api::{AppState, create_router, websocket::WsTransport},
    config::RateLimitConfig,
};
use private_codex::{
    SessionActor, SessionConfig, SessionHandle, StandardRules, TcpTransport, UserError,
    entities::Username,
    game::MemorySnapshotStore,
    messages::{ChatMessage, ClientError, ServerMessage, UserCommand},
    utils,
};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    http: SocketAddr,
    tcp: SocketAddr,
    session: SessionHandle,
}

async fn start(rate_limit: RateLimitConfig) -> TestServer {
    let probe_interval = Duration::from_secs(5);
    let ws = Arc::new(WsTransport::new());
    let tcp = Arc::new(TcpTransport::new());
    let (actor, session) = SessionActor::new(
        SessionConfig {
            probe_interval,
            rng_seed: Some(3),
            ..Default::default()
        },
        Arc::new(StandardRules),
        Arc::new(MemorySnapshotStore::new()),
        vec![tcp.clone(), ws.clone()],
    );
    actor.spawn();

    let tcp_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let tcp_addr = tcp_listener.local_addr().unwrap();
    tokio::spawn(TcpTransport::serve(
        tcp_listener,
        tcp,
        session.clone(),
        probe_interval,
    ));

    let app = create_router(AppState {
        session: session.clone(),
        transport: ws,
        probe_interval,
        rate_limit,
    });
    let http_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_addr = http_listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(http_listener, app).await.unwrap();
    });

    TestServer {
        http: http_addr,
        tcp: tcp_addr,
        session,
    }
}

async fn ws_connect(server: &TestServer) -> Ws {
    let (ws, _) = connect_async(format!("ws://{}/ws", server.http))
        .await
        .unwrap();
    ws
}

async fn ws_send(ws: &mut Ws, command: &UserCommand) {
    let json = serde_json::to_string(command).unwrap();
    ws.send(Message::text(json)).await.unwrap();
}

async fn ws_recv(ws: &mut Ws) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("message in time")
            .expect("stream open")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn ws_recv_until(ws: &mut Ws, pred: impl Fn(&ServerMessage) -> bool) -> ServerMessage {
    loop {
        let msg = ws_recv(ws).await;
        if pred(&msg) {
            return msg;
        }
    }
}

async fn tcp_send(stream: &mut TcpStream, command: &UserCommand) {
    let frame = utils::encode(command).unwrap();
    utils::write_frame(stream, &frame).await.unwrap();
}

async fn tcp_recv(stream: &mut TcpStream) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), utils::read_frame(stream))
            .await
            .expect("frame in time")
            .unwrap();
        let utils::Frame::Body(body) = frame else {
            panic!("server sent an oversized frame");
        };
        let msg: ServerMessage = utils::decode(&body).unwrap();
        if msg != ServerMessage::Ping {
            return msg;
        }
        tcp_send(stream, &UserCommand::Pong).await;
    }
}

async fn tcp_recv_until(
    stream: &mut TcpStream,
    pred: impl Fn(&ServerMessage) -> bool,
) -> ServerMessage {
    loop {
        let msg = tcp_recv(stream).await;
        if pred(&msg) {
            return msg;
        }
    }
}

#[tokio::test]
async fn test_login_ack_precedes_roster() {
    let server = start(RateLimitConfig::default()).await;
    let mut ws = ws_connect(&server).await;
    let login = UserCommand::Login(Username::new("ann"));
    ws_send(&mut ws, &login).await;
    assert_eq!(ws_recv(&mut ws).await, ServerMessage::Ack(login));
    match ws_recv(&mut ws).await {
        ServerMessage::Roster(roster) => assert_eq!(roster.names(), vec![Username::new("ann")]),
        other => panic!("expected roster, got {other}"),
    }
}

#[tokio::test]
async fn test_invalid_json_is_rejected_locally() {
    let server = start(RateLimitConfig::default()).await;
    let mut ws = ws_connect(&server).await;
    ws.send(Message::text("{\"Login\": 12}")).await.unwrap();
    assert_eq!(
        ws_recv(&mut ws).await,
        ServerMessage::ClientError(ClientError::InvalidMessage)
    );
    let status = server.session.status().await.unwrap();
    assert!(status.players.is_empty());
}

#[tokio::test]
async fn test_command_before_login_is_unassociated() {
    let server = start(RateLimitConfig::default()).await;
    let mut ws = ws_connect(&server).await;
    ws_send(&mut ws, &UserCommand::FixCapacity(2)).await;
    assert_eq!(
        ws_recv(&mut ws).await,
        ServerMessage::ClientError(ClientError::Unassociated)
    );
}

#[tokio::test]
async fn test_burst_is_rate_limited() {
    let server = start(RateLimitConfig {
        burst: 2,
        sustained: 100,
    })
    .await;
    let mut ws = ws_connect(&server).await;
    for text in ["one", "two", "three"] {
        ws_send(&mut ws, &UserCommand::SendChat(text.to_string())).await;
    }
    let replies = [ws_recv(&mut ws).await, ws_recv(&mut ws).await, ws_recv(&mut ws).await];
    assert!(replies.contains(&ServerMessage::ClientError(ClientError::RateLimited)));
}

#[tokio::test]
async fn test_direct_chat_crosses_transports() {
    let server = start(RateLimitConfig::default()).await;

    let mut ann = TcpStream::connect(server.tcp).await.unwrap();
    tcp_send(&mut ann, &UserCommand::Login(Username::new("ann"))).await;
    assert!(matches!(tcp_recv(&mut ann).await, ServerMessage::Ack(_)));

    let mut bob = ws_connect(&server).await;
    ws_send(&mut bob, &UserCommand::Login(Username::new("bob"))).await;
    assert!(matches!(ws_recv(&mut bob).await, ServerMessage::Ack(_)));

    let mut cat = ws_connect(&server).await;
    ws_send(&mut cat, &UserCommand::Login(Username::new("cat"))).await;
    assert!(matches!(ws_recv(&mut cat).await, ServerMessage::Ack(_)));

    tcp_send(&mut ann, &UserCommand::SendChat("@bob meet at 0,0".to_string())).await;
    let expected = ServerMessage::Chat(ChatMessage {
        from: Username::new("ann"),
        text: "@bob meet at 0,0".to_string(),
        direct: true,
    });
    assert_eq!(
        ws_recv_until(&mut bob, |msg| matches!(msg, ServerMessage::Chat(_))).await,
        expected
    );

    // Cat only sees the broadcast that follows, never the direct message.
    tcp_send(&mut ann, &UserCommand::SendChat("hello all".to_string())).await;
    match ws_recv_until(&mut cat, |msg| matches!(msg, ServerMessage::Chat(_))).await {
        ServerMessage::Chat(chat) => {
            assert_eq!(chat.text, "hello all");
            assert!(!chat.direct);
        }
        other => panic!("expected chat, got {other}"),
    }
}

#[tokio::test]
async fn test_closing_a_websocket_tears_down_tcp_players() {
    let server = start(RateLimitConfig::default()).await;

    let mut ann = TcpStream::connect(server.tcp).await.unwrap();
    tcp_send(&mut ann, &UserCommand::Login(Username::new("ann"))).await;
    assert!(matches!(tcp_recv(&mut ann).await, ServerMessage::Ack(_)));

    let mut bob = ws_connect(&server).await;
    ws_send(&mut bob, &UserCommand::Login(Username::new("bob"))).await;
    assert!(matches!(ws_recv(&mut bob).await, ServerMessage::Ack(_)));
    bob.close(None).await.unwrap();

    let expected = ServerMessage::Disconnected(UserError::ConnectionLost(Username::new("bob")));
    tcp_recv_until(&mut ann, |msg| *msg == expected).await;

    let status = server.session.status().await.unwrap();
    assert!(status.players.is_empty());
    assert_eq!(status.cascades, 1);
}

#[tokio::test]
async fn test_match_setup_over_websocket() {
    let server = start(RateLimitConfig::default()).await;
    let mut ann = ws_connect(&server).await;
    let mut bob = ws_connect(&server).await;

    ws_send(&mut ann, &UserCommand::Login(Username::new("ann"))).await;
    ws_recv_until(&mut ann, |msg| matches!(msg, ServerMessage::Ack(_))).await;
    ws_send(&mut bob, &UserCommand::Login(Username::new("bob"))).await;
    ws_recv_until(&mut bob, |msg| matches!(msg, ServerMessage::Ack(_))).await;

    // Only the first player may fix the capacity.
    ws_send(&mut bob, &UserCommand::FixCapacity(2)).await;
    assert_eq!(
        ws_recv_until(&mut bob, |msg| matches!(msg, ServerMessage::UserError(_))).await,
        ServerMessage::UserError(UserError::NotYourTurn)
    );

    ws_send(&mut ann, &UserCommand::FixCapacity(2)).await;
    let starting = ws_recv_until(&mut bob, |msg| {
        matches!(msg, ServerMessage::MatchStarting { .. })
    })
    .await;
    assert!(matches!(
        starting,
        ServerMessage::MatchStarting { resumed: false, .. }
    ));
    match ws_recv_until(&mut bob, |msg| matches!(msg, ServerMessage::Hand(_))).await {
        ServerMessage::Hand(hand) => assert!(hand.root.is_some()),
        other => panic!("expected hand, got {other}"),
    }

    let status = server.session.status().await.unwrap();
    assert_eq!(status.phase, "await_color");
    assert_eq!(status.capacity, Some(2));
}
