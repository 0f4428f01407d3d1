//! WebSocket upgrade handler

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::game::{AttachError, GameServer};
use crate::session::Session;
use crate::util::rate_limit::SessionRateLimiter;

/// Interval between keepalive pings
pub const PING_INTERVAL: Duration = Duration::from_secs(20);
/// A connection with no inbound frame for this long is dropped
pub const READ_DEADLINE: Duration = Duration::from_secs(60);
/// "Try again later" close code
pub const CLOSE_TRY_AGAIN_LATER: u16 = 1013;

/// Query parameters for WebSocket connection
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    pub name: Option<String>,
    pub color: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, query, state.server))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, query: WsQuery, server: Arc<GameServer>) {
    let (mut ws_sink, ws_stream) = socket.split();

    let (session, outbound) = match server.attach(query.name.as_deref(), query.color.as_deref()) {
        Ok(attached) => attached,
        Err(AttachError::ServerFull { max }) => {
            warn!(max_players = max, "Rejecting connection, server full");
            let _ = ws_sink
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_TRY_AGAIN_LATER,
                    reason: Cow::from("try again later"),
                })))
                .await;
            return;
        }
    };

    info!(session_id = session.id, "New WebSocket connection");

    let writer_handle = tokio::spawn(run_writer(session.id, ws_sink, outbound));

    run_reader(&server, &session, ws_stream).await;

    server.detach(session.id);
    writer_handle.abort();

    info!(
        session_id = session.id,
        idle_secs = session.last_seen().elapsed().as_secs(),
        "WebSocket connection closed"
    );
}

/// Drain the session's outbound queue into the socket, pinging periodically
async fn run_writer(
    session_id: u32,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Bytes>,
) {
    let mut ping = tokio::time::interval(PING_INTERVAL);
    // The first tick completes immediately
    ping.tick().await;

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    debug!(session_id, "Outbound queue closed");
                    break;
                };
                if let Err(e) = ws_sink.send(Message::Binary(frame.to_vec())).await {
                    debug!(session_id, error = %e, "WebSocket send failed");
                    break;
                }
            }
            _ = ping.tick() => {
                if let Err(e) = ws_sink.send(Message::Ping(Vec::new())).await {
                    debug!(session_id, error = %e, "WebSocket ping failed");
                    break;
                }
            }
        }
    }

    let _ = ws_sink.close().await;
}

/// Read client envelopes until the socket closes, errors or goes quiet
async fn run_reader(
    server: &GameServer,
    session: &Session,
    mut ws_stream: SplitStream<WebSocket>,
) {
    let rate_limiter = SessionRateLimiter::new();

    loop {
        let next = match tokio::time::timeout(READ_DEADLINE, ws_stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                info!(session_id = session.id, "Read deadline expired");
                break;
            }
        };

        let payload = match next {
            Some(Ok(Message::Text(text))) => text.into_bytes(),
            Some(Ok(Message::Binary(data))) => data,
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                session.touch();
                continue;
            }
            Some(Ok(Message::Close(_))) => {
                info!(session_id = session.id, "Client initiated close");
                break;
            }
            Some(Err(e)) => {
                debug!(session_id = session.id, error = %e, "WebSocket error");
                break;
            }
            None => break,
        };

        session.touch();

        if !rate_limiter.check_input() {
            warn!(session_id = session.id, "Rate limited input message");
            continue;
        }

        match server.codec().decode(&payload) {
            Ok(msg) => server.handle_input(session, msg),
            Err(e) => {
                debug!(session_id = session.id, error = %e, "Failed to decode client message");
            }
        }
    }
}
