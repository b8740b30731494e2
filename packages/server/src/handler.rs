//! WebSocket connection handling

use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    pub session: Option<String>,
}

/// Close code sent to a connection that another connection for the same
/// session has replaced. Clients must not reconnect on it.
pub const REPLACED_CLOSE_CODE: u16 = 4000;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.session))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, requested: Option<String>) {
    let (mut sender, mut receiver) = socket.split();
    let (session, generation, mut rx) = match state.registry.connect(requested.as_deref()) {
        Ok(connected) => connected,
        Err(err) => {
            error!(error = %err, "failed to create session");
            let _ = sender
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::ERROR,
                    reason: "session unavailable".into(),
                })))
                .await;
            return;
        }
    };
    info!(session = session.id(), generation, "client connected");

    let outbound_session = session.clone();
    let mut sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(err) => {
                    error!(error = %err, "failed to serialize message");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        let frame = if outbound_session.is_current(generation) {
            None
        } else {
            debug!(session = outbound_session.id(), generation, "connection replaced");
            Some(CloseFrame {
                code: REPLACED_CLOSE_CODE,
                reason: "replaced".into(),
            })
        };
        let _ = sender.send(Message::Close(frame)).await;
    });

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    // malformed frames and replay misses are logged inside
                    let _ = session.handle_text(&text);
                }
                Some(Ok(Message::Binary(_))) => {
                    debug!(session = session.id(), "ignoring binary frame");
                }
                Some(Ok(Message::Ping(_))) => {
                    debug!(session = session.id(), "received ping");
                }
                Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    info!(session = session.id(), "client disconnected");
                    break;
                }
                Some(Err(err)) => {
                    warn!(session = session.id(), error = %err, "websocket error");
                    break;
                }
            },
            _ = &mut sender_task => break,
        }
    }

    state.registry.release(&session, generation);
    sender_task.abort();
}
