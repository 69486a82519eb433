use crate::assistant::Assistant;
use crate::cli::Args;
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::session::{ ChatSession, PendingReply };

use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::net::TcpListener;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::task::JoinSet;

use tokio_tungstenite::{ accept_hdr_async, WebSocketStream };
use tokio_tungstenite::tungstenite::handshake::server::{ Request, Response, ErrorResponse };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_rustls::TlsAcceptor;

use rustls::ServerConfig;
use rustls::pki_types::{ CertificateDer, PrivateKeyDer };
use rustls_pemfile::{ certs, pkcs8_private_keys };

use lazy_static::lazy_static;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };

use hmac::{ Hmac, Mac };
use sha2::Sha256;
use chrono::Utc;
use url::form_urlencoded;

use log::{ debug, info, warn, error };
use futures::{ Sink, SinkExt, StreamExt };
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;

/// How far a signed handshake timestamp may drift from server time.
const MAX_CLOCK_SKEW_SECS: u64 = 300;

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(NonZeroU32::new(10).unwrap()));
}

fn load_tls_config(
    cert_path: &str,
    key_path: &str
) -> Result<Arc<ServerConfig>, Box<dyn Error + Send + Sync>> {
    let cert_file = File::open(cert_path).map_err(|e|
        format!("Failed to open TLS certificate file '{}': {}", cert_path, e)
    )?;
    let key_file = File::open(key_path).map_err(|e|
        format!("Failed to open TLS key file '{}': {}", key_path, e)
    )?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Failed to read certificate(s): {}", e))?;

    let mut keys = pkcs8_private_keys(&mut key_reader);
    let key = match keys.next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(format!("Error reading private key: {}", e).into());
        }
        None => {
            return Err("No PKCS8 private key found in key file".into());
        }
    };

    super::install_crypto_provider();
    let config = ServerConfig::builder().with_no_client_auth().with_single_cert(cert_chain, key)?;
    Ok(Arc::new(config))
}

/// Hex HMAC-SHA256 of the unix timestamp string, keyed by the shared secret.
pub fn sign_timestamp(secret: &str, ts: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e|
        format!("Invalid HMAC key: {}", e)
    )?;
    mac.update(ts.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn reject(reason: &str) -> ErrorResponse {
    let mut res = ErrorResponse::new(Some(reason.to_string()));
    *res.status_mut() = StatusCode::UNAUTHORIZED;
    res
}

/// Checks the `ts`/`sig` query parameters of a handshake against `secret`.
fn verify_handshake(query: &str, secret: &str, now: i64) -> Result<(), &'static str> {
    let params: HashMap<String, String> = form_urlencoded
        ::parse(query.as_bytes())
        .into_owned()
        .collect();

    let ts = params
        .get("ts")
        .or_else(|| params.get("X-Api-Ts"))
        .map(|s| s.as_str());
    let sig = params
        .get("sig")
        .or_else(|| params.get("X-Api-Sign"))
        .map(|s| s.as_str());

    let (Some(ts), Some(sig)) = (ts, sig) else {
        return Err("missing ts/sig");
    };

    let ts_i: i64 = ts.parse().map_err(|_| "bad timestamp")?;
    if now.abs_diff(ts_i) > MAX_CLOCK_SKEW_SECS {
        return Err("timestamp out of range");
    }

    let sig_bytes = hex::decode(sig).map_err(|_| "bad signature")?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "bad signature")?;
    mac.update(ts.as_bytes());
    mac.verify_slice(&sig_bytes).map_err(|_| "bad signature")
}

pub async fn start_ws_server(
    addr: &str,
    assistant: Arc<Mutex<Assistant>>,
    api_key: Option<String>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    let protocol = if args.tls_paths().is_some() { "wss" } else { "ws" };
    info!("{} server listening on: {}", protocol.to_uppercase(), addr);

    let tls_acceptor = if args.enable_tls {
        match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    cert_path,
                    key_path
                );
                let config = load_tls_config(cert_path, key_path)?;
                Some(TlsAcceptor::from(config))
            }
            (Some(_), None) | (None, Some(_)) => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("Missing TLS certificate or key path".into());
            }
            (None, None) => {
                error!("--enable-tls was set but no certificate/key paths provided.");
                return Err("TLS enabled without cert/key".into());
            }
        }
    } else {
        info!("TLS not enabled. Running plain WebSocket (WS) server.");
        None
    };

    let api_key = api_key.filter(|k| !k.trim().is_empty());
    if api_key.is_some() {
        info!("Chat server requires signed handshakes.");
    } else {
        warn!("Chat server configured WITHOUT handshake signing. Connections are open.");
    }

    serve(listener, assistant, api_key, tls_acceptor).await
}

/// Accept loop over an already-bound listener.
pub async fn serve(
    listener: TcpListener,
    assistant: Arc<Mutex<Assistant>>,
    api_key: Option<String>,
    tls_acceptor: Option<TlsAcceptor>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let assistant_clone = Arc::clone(&assistant);
        let required_api_key = api_key.clone();
        let tls_acceptor_clone = tls_acceptor.clone();

        tokio::spawn(async move {
            let process_result = if let Some(acceptor) = tls_acceptor_clone {
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        info!("TLS handshake successful for {}", peer);
                        process_connection(peer, tls_stream, assistant_clone, required_api_key).await
                    }
                    Err(e) => {
                        error!("TLS handshake error for {}: {}", peer, e);
                        Err(Box::new(e) as Box<dyn Error + Send + Sync>)
                    }
                }
            } else {
                process_connection(peer, stream, assistant_clone, required_api_key).await
            };

            if let Err(e) = process_result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    assistant: Arc<Mutex<Assistant>>,
    required_api_key: Option<String>
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let Some(secret) = required_api_key.as_deref() else {
            return Ok(response);
        };

        match verify_handshake(req.uri().query().unwrap_or(""), secret, Utc::now().timestamp()) {
            Ok(()) => {
                info!("{} authenticated", peer);
                Ok(response)
            }
            Err(reason) => {
                warn!("{}: rejected handshake ({})", peer, reason);
                Err(reject(reason))
            }
        }
    };

    match accept_hdr_async(stream, auth_callback).await {
        Ok(ws) => {
            handle_connection(peer, ws, assistant).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}

async fn send_frame<S>(tx: &mut S, frame: &ServerMessage) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: Sink<Message> + Unpin, S::Error: Error + Send + Sync + 'static
{
    let json = serde_json::to_string(frame)?;
    tx.send(Message::Text(json)).await?;
    Ok(())
}

/// Drives one chat session and hands it back once the connection ends.
/// Replies are scheduled on a `JoinSet`; any that have not fired by then
/// are aborted and never reach the session.
pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    assistant: Arc<Mutex<Assistant>>
) -> ChatSession
    where S: AsyncRead + AsyncWrite + Unpin + Send
{
    info!("New WebSocket connection: {}", peer);

    let (mut tx, mut rx) = websocket.split();
    let conversation_id = Uuid::new_v4().to_string();
    info!("Assigned conversation ID {} to {}", conversation_id, peer);

    let (mut session, welcome, typing_delay) = {
        let guard = assistant.lock().await;
        let session = ChatSession::new(conversation_id.clone(), guard.greeting());
        let greeting = &session.messages()[0];
        let welcome = ServerMessage::Welcome {
            id: greeting.id,
            content: greeting.text.clone(),
            timestamp: greeting.timestamp.timestamp(),
            quick_actions: if session.shows_quick_actions() {
                guard.quick_actions().to_vec()
            } else {
                Vec::new()
            },
        };
        (session, welcome, guard.typing_delay())
    };

    if let Err(e) = send_frame(&mut tx, &welcome).await {
        error!("Error sending welcome to {}: {}", peer, e);
        return session;
    }

    let mut pending: JoinSet<PendingReply> = JoinSet::new();

    loop {
        tokio::select! {
            incoming = rx.next() => {
                let Some(msg) = incoming else {
                    break;
                };
                match msg {
                    Ok(message) => {
                        if message.len() > MAX_MESSAGE_SIZE {
                            warn!(
                                "Message from {} exceeds size limit ({} > {})",
                                peer,
                                message.len(),
                                MAX_MESSAGE_SIZE
                            );
                            let error_msg = ServerMessage::Error {
                                message: "Message too large".to_string(),
                            };
                            if let Err(e) = send_frame(&mut tx, &error_msg).await {
                                error!("Failed to send size limit error to {}: {}", peer, e);
                            }
                            break;
                        }

                        match message {
                            Message::Text(text) => {
                                match serde_json::from_str::<ClientMessage>(&text) {
                                    Ok(ClientMessage::Chat { content }) => {
                                        let was_composing = session.is_composing();
                                        let submitted = {
                                            let guard = assistant.lock().await;
                                            session.submit(&content, &guard)
                                        };
                                        let Some((user_message, reply)) = submitted else {
                                            debug!("Ignoring blank chat message from {}", peer);
                                            continue;
                                        };

                                        let accepted = ServerMessage::Accepted {
                                            id: user_message.id,
                                            content: user_message.text,
                                            timestamp: user_message.timestamp.timestamp(),
                                        };
                                        if let Err(e) = send_frame(&mut tx, &accepted).await {
                                            error!("Error sending accepted message to {}: {}", peer, e);
                                            break;
                                        }
                                        if !was_composing {
                                            let typing = ServerMessage::Typing { active: true };
                                            if let Err(e) = send_frame(&mut tx, &typing).await {
                                                error!("Error sending typing status to {}: {}", peer, e);
                                                break;
                                            }
                                        }

                                        let delay = typing_delay.sample();
                                        debug!(
                                            "Reply to message {} in conversation {} scheduled after {:?}",
                                            reply.in_reply_to,
                                            conversation_id,
                                            delay
                                        );
                                        pending.spawn(async move {
                                            tokio::time::sleep(delay).await;
                                            reply
                                        });
                                    }
                                    Err(e) => {
                                        error!("Failed to parse message from {}: {}", peer, e);
                                        let error_msg = ServerMessage::Error {
                                            message: format!("Failed to parse message: {}", e),
                                        };
                                        if let Err(e) = send_frame(&mut tx, &error_msg).await {
                                            error!("Error sending parse error to {}: {}", peer, e);
                                            break;
                                        }
                                    }
                                }
                            }
                            Message::Close(_) => {
                                info!("Received close frame from {}", peer);
                                break;
                            }
                            Message::Ping(ping_data) => {
                                if tx.send(Message::Pong(ping_data)).await.is_err() {
                                    error!("Failed to send pong to {}", peer);
                                    break;
                                }
                            }
                            Message::Pong(_) => {}
                            Message::Binary(_) => {
                                warn!("Ignoring binary message from {}", peer);
                            }
                            Message::Frame(_) => {}
                        }
                    }
                    Err(e) => {
                        match e {
                            | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                            | tokio_tungstenite::tungstenite::Error::Protocol(_)
                            | tokio_tungstenite::tungstenite::Error::Utf8 => {
                                info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                            }
                            tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                                io_err.kind() == std::io::ErrorKind::ConnectionReset
                            => {
                                info!("WebSocket connection reset by peer {}", peer);
                            }
                            tokio_tungstenite::tungstenite::Error::Capacity(ref cap_err) => {
                                error!("WebSocket capacity error for {}: {}", peer, cap_err);
                                let error_msg = ServerMessage::Error {
                                    message: "Server capacity error".to_string(),
                                };
                                let _ = send_frame(&mut tx, &error_msg).await;
                            }
                            _ => {
                                error!("Error receiving message from {}: {}", peer, e);
                            }
                        }
                        break;
                    }
                }
            }
            joined = pending.join_next(), if !pending.is_empty() => {
                match joined {
                    Some(Ok(reply)) => {
                        let response = {
                            let message = session.deliver(reply);
                            ServerMessage::Response {
                                id: message.id,
                                content: message.text.clone(),
                                timestamp: message.timestamp.timestamp(),
                            }
                        };
                        if let Err(e) = send_frame(&mut tx, &response).await {
                            error!("Error sending response to {}: {}", peer, e);
                            break;
                        }
                        if !session.is_composing() {
                            let typing = ServerMessage::Typing { active: false };
                            if let Err(e) = send_frame(&mut tx, &typing).await {
                                error!("Error sending typing status to {}: {}", peer, e);
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("Delayed reply task failed for {}: {}", peer, e);
                    }
                    None => {}
                }
            }
        }
    }

    if !pending.is_empty() {
        debug!("Cancelling {} undelivered replies for {}", pending.len(), peer);
    }
    pending.abort_all();
    info!(
        "WebSocket connection closed for {} (Conv ID: {}, {} messages)",
        peer,
        session.id(),
        session.messages().len()
    );
    session
}
