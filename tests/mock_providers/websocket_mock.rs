//! WebSocket Mock Server for the realtime transcription service

use super::MockStats;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// How the mock answers the credential frame
#[derive(Clone, Debug)]
pub enum AuthBehavior {
    Accept,
    Reject { code: String, message: String },
}

/// WebSocket Mock Server State
pub struct RealtimeMockState {
    pub auth: AuthBehavior,
    /// Emit a partial result every N audio chunks (0 disables)
    pub partial_every: u64,
    pub stats: MockStats,
    /// Request URIs (path and query) of accepted connections
    pub request_uris: Mutex<Vec<String>>,
    /// Credential frames received, parsed
    pub credentials: Mutex<Vec<Value>>,
}

impl RealtimeMockState {
    pub fn new(auth: AuthBehavior, partial_every: u64) -> Self {
        Self {
            auth,
            partial_every,
            stats: MockStats::default(),
            request_uris: Mutex::new(Vec::new()),
            credentials: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::new(AuthBehavior::Accept, 2)
    }

    pub fn rejecting(code: &str, message: &str) -> Self {
        Self::new(
            AuthBehavior::Reject {
                code: code.to_string(),
                message: message.to_string(),
            },
            0,
        )
    }
}

/// Handle a single session connection
async fn handle_connection(
    stream: TcpStream,
    state: Arc<RealtimeMockState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut request_uri = String::new();
    let ws_stream = accept_hdr_async(
        stream,
        |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            request_uri = req.uri().to_string();
            Ok(resp)
        },
    )
    .await?;
    let ack_enabled = request_uri.contains("isAckEnabled=true");
    state.request_uris.lock().push(request_uri);

    let conn_id = state.stats.connections.fetch_add(1, Ordering::Relaxed) + 1;
    let session_id = format!("mock-session-{conn_id}");
    let (mut write, mut read) = ws_stream.split();

    // The first frame must be the credential
    let credential = loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => break serde_json::from_str::<Value>(&text)?,
            Some(Ok(Message::Close(_))) | None => return Ok(()),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    };
    state.stats.credential_frames.fetch_add(1, Ordering::Relaxed);
    state.credentials.lock().push(credential);

    match &state.auth {
        AuthBehavior::Accept => {
            let connect = json!({"event": "CONNECT", "sessionId": session_id});
            write.send(Message::Text(connect.to_string().into())).await?;
        }
        AuthBehavior::Reject { code, message } => {
            let error = json!({
                "event": "ERROR",
                "sessionId": session_id,
                "code": code,
                "message": message,
            });
            write.send(Message::Text(error.to_string().into())).await?;
            write
                .send(Message::Close(Some(CloseFrame {
                    code: CloseCode::Policy,
                    reason: "authentication failed".into(),
                })))
                .await?;
            return Ok(());
        }
    }

    let mut sequence = 0u64;
    let mut offset = 0u64;
    let mut pending_words: Vec<String> = Vec::new();

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Binary(audio)) => {
                let length = audio.len() as u64;
                state.stats.record_audio(audio.len());
                sequence += 1;

                if ack_enabled {
                    let ack = json!({
                        "event": "ACKAUDIO",
                        "sessionId": session_id,
                        "details": {"sequenceNumber": sequence, "length": length, "offset": offset},
                    });
                    write.send(Message::Text(ack.to_string().into())).await?;
                }
                offset += length;

                pending_words.push(format!("word{sequence}"));
                if state.partial_every > 0 && sequence % state.partial_every == 0 {
                    let partial = json!({
                        "event": "RESULT",
                        "sessionId": session_id,
                        "transcriptions": [{
                            "transcription": pending_words.join(" "),
                            "isFinal": false,
                            "startTimeInMs": 0,
                            "endTimeInMs": sequence * 100,
                            "confidence": 0.5,
                            "tokens": [],
                        }],
                    });
                    write.send(Message::Text(partial.to_string().into())).await?;
                }
            }
            Ok(Message::Text(text)) => {
                let Ok(control) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                if control.get("event").and_then(|e| e.as_str()) == Some("SENDFINALRESULT") {
                    state.stats.final_requests.fetch_add(1, Ordering::Relaxed);
                    let final_result = json!({
                        "event": "RESULT",
                        "sessionId": session_id,
                        "transcriptions": [{
                            "transcription": pending_words.join(" "),
                            "isFinal": true,
                            "startTimeInMs": 0,
                            "endTimeInMs": sequence * 100,
                            "confidence": 0.93,
                            "tokens": pending_words.iter().map(|w| json!({
                                "token": w, "confidence": 0.93, "type": "WORD"
                            })).collect::<Vec<_>>(),
                        }],
                    });
                    pending_words.clear();
                    write.send(Message::Text(final_result.to_string().into())).await?;
                }
            }
            Ok(Message::Close(_)) => {
                // The close reply goes out on the next read, which then ends the stream
            }
            Ok(Message::Ping(data)) => {
                write.send(Message::Pong(data)).await?;
            }
            Err(e) => {
                eprintln!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

/// Bind the mock server on an ephemeral port and serve in the background
pub async fn spawn_realtime_mock(
    state: Arc<RealtimeMockState>,
) -> std::io::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    eprintln!("Mock accept error: {}", e);
                    return;
                }
            };
            let state = state.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, state).await {
                    eprintln!("Mock connection error: {}", e);
                }
            });
        }
    });

    Ok((addr, handle))
}
