use futures::{ SinkExt, StreamExt };
use medicare_assistant::assistant::{ Assistant, TypingDelay };
use medicare_assistant::config::replies::{ default_table, FALLBACK_REPLY, OPENING_GREETING };
use medicare_assistant::models::chat::Sender;
use medicare_assistant::models::websocket::ServerMessage;
use medicare_assistant::server::websocket::{ handle_connection, serve, sign_timestamp };
use medicare_assistant::session::ChatSession;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{ duplex, AsyncRead, AsyncWrite, DuplexStream };
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{ accept_async, client_async, connect_async, WebSocketStream };

async fn spawn_server(delay: TypingDelay, api_key: Option<&str>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let assistant = Arc::new(Mutex::new(Assistant::with_table(default_table(), delay)));
    tokio::spawn(serve(listener, assistant, api_key.map(str::to_string), None));
    addr
}

/// Runs one session over an in-memory pipe and returns the client end plus
/// the task that yields the finished session.
async fn open_session(
    delay: TypingDelay
) -> (WebSocketStream<DuplexStream>, JoinHandle<ChatSession>) {
    let (client_io, server_io) = duplex(64 * 1024);
    let assistant = Arc::new(Mutex::new(Assistant::with_table(default_table(), delay)));
    let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();
    let server = tokio::spawn(async move {
        let ws = accept_async(server_io).await.unwrap();
        handle_connection(peer, ws, assistant).await
    });
    let (ws, _) = client_async("ws://localhost/", client_io).await.unwrap();
    (ws, server)
}

async fn next_frame<S>(ws: &mut WebSocketStream<S>) -> ServerMessage
    where S: AsyncRead + AsyncWrite + Unpin
{
    loop {
        let msg = tokio::time
            ::timeout(Duration::from_secs(5), ws.next()).await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send_chat<S>(ws: &mut WebSocketStream<S>, content: &str)
    where S: AsyncRead + AsyncWrite + Unpin
{
    let frame = serde_json::json!({ "type": "chat", "content": content });
    ws.send(Message::Text(frame.to_string())).await.unwrap();
}

#[tokio::test]
async fn conversation_round_trip() {
    let addr = spawn_server(TypingDelay::none(), None).await;
    let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

    match next_frame(&mut ws).await {
        ServerMessage::Welcome { id, content, quick_actions, .. } => {
            assert_eq!(id, 1);
            assert_eq!(content, OPENING_GREETING);
            assert_eq!(quick_actions.len(), 4);
        }
        other => panic!("expected welcome, got {:?}", other),
    }

    send_chat(&mut ws, "Where is your store located?").await;
    assert!(
        matches!(next_frame(&mut ws).await, ServerMessage::Accepted { id: 2, ref content, .. } if content == "Where is your store located?")
    );
    assert_eq!(next_frame(&mut ws).await, ServerMessage::Typing { active: true });
    match next_frame(&mut ws).await {
        ServerMessage::Response { id, content, .. } => {
            assert_eq!(id, 3);
            assert!(content.contains("123 Health Street"));
        }
        other => panic!("expected response, got {:?}", other),
    }
    assert_eq!(next_frame(&mut ws).await, ServerMessage::Typing { active: false });

    // Blank input is dropped silently; the next real message continues the ids.
    send_chat(&mut ws, "   ").await;
    send_chat(&mut ws, "asdfqwer").await;
    assert!(matches!(next_frame(&mut ws).await, ServerMessage::Accepted { id: 4, .. }));
    assert_eq!(next_frame(&mut ws).await, ServerMessage::Typing { active: true });
    match next_frame(&mut ws).await {
        ServerMessage::Response { id, content, .. } => {
            assert_eq!(id, 5);
            assert_eq!(content, FALLBACK_REPLY);
        }
        other => panic!("expected response, got {:?}", other),
    }
}

#[tokio::test]
async fn malformed_frame_gets_error() {
    let addr = spawn_server(TypingDelay::none(), None).await;
    let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    next_frame(&mut ws).await;

    ws.send(Message::Text("{\"type\":\"checkout\"}".into())).await.unwrap();
    assert!(matches!(next_frame(&mut ws).await, ServerMessage::Error { .. }));
}

#[tokio::test(start_paused = true)]
async fn reply_waits_for_typing_delay() {
    let (mut ws, _server) = open_session(TypingDelay::from_millis(1500, 1500).unwrap()).await;
    next_frame(&mut ws).await;

    send_chat(&mut ws, "I need an urgent delivery").await;
    let sent_at = Instant::now();
    assert!(matches!(next_frame(&mut ws).await, ServerMessage::Accepted { .. }));
    assert_eq!(next_frame(&mut ws).await, ServerMessage::Typing { active: true });
    match next_frame(&mut ws).await {
        ServerMessage::Response { content, .. } => assert!(content.contains("24/7 hotline")),
        other => panic!("expected response, got {:?}", other),
    }
    assert!(sent_at.elapsed() >= Duration::from_millis(1500));
}

#[tokio::test]
async fn closing_mid_delay_cancels_pending_reply() {
    let (mut ws, server) = open_session(TypingDelay::from_millis(60_000, 60_000).unwrap()).await;
    next_frame(&mut ws).await;

    send_chat(&mut ws, "Track my order").await;
    assert!(matches!(next_frame(&mut ws).await, ServerMessage::Accepted { id: 2, .. }));
    assert_eq!(next_frame(&mut ws).await, ServerMessage::Typing { active: true });
    ws.close(None).await.unwrap();

    let session = tokio::time
        ::timeout(Duration::from_secs(5), server).await
        .expect("session outlived its connection")
        .unwrap();
    let senders: Vec<Sender> = session
        .messages()
        .iter()
        .map(|m| m.sender)
        .collect();
    assert_eq!(senders, vec![Sender::Assistant, Sender::User]);
}

#[tokio::test]
async fn server_keeps_accepting_after_abandoned_session() {
    let addr = spawn_server(TypingDelay::from_millis(60_000, 60_000).unwrap(), None).await;

    let (mut first, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    next_frame(&mut first).await;
    send_chat(&mut first, "Where is your store located?").await;
    next_frame(&mut first).await;
    drop(first);

    let (mut second, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    assert!(matches!(next_frame(&mut second).await, ServerMessage::Welcome { id: 1, .. }));
}

#[tokio::test]
async fn unsigned_handshake_is_refused_when_key_is_set() {
    let addr = spawn_server(TypingDelay::none(), Some("s3cret")).await;
    assert!(connect_async(format!("ws://{}", addr)).await.is_err());

    let ts = chrono::Utc::now().timestamp().to_string();
    let sig = sign_timestamp("s3cret", &ts).unwrap();
    let (mut ws, _) = connect_async(format!("ws://{}/?ts={}&sig={}", addr, ts, sig)).await.unwrap();
    assert!(matches!(next_frame(&mut ws).await, ServerMessage::Welcome { .. }));
}
