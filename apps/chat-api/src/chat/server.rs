//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::error::ChatError;
use crate::AppState;

use super::connection::ConnectionHandler;
use super::events::ServerMessage;
use super::sink::ChannelSink;

pub fn router() -> Router<AppState> {
    Router::new().route("/chat/{room}", get(ws_upgrade))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, room, state))
}

async fn handle_connection(socket: WebSocket, room: String, state: AppState) {
    let (ws_tx, ws_rx) = socket.split();
    let (sink, outbound) = ChannelSink::new();

    let mut handler = ConnectionHandler::open(
        room,
        Arc::new(sink),
        state.rooms.clone(),
        state.history.clone(),
    );

    tracing::info!(
        connection_id = %handler.connection_id(),
        room = %handler.room_name(),
        "chat connection opened"
    );

    run_connection(&mut handler, ws_tx, ws_rx, outbound).await;
    handler.on_close();

    tracing::info!(
        connection_id = %handler.connection_id(),
        room = %handler.room_name(),
        "chat connection closed"
    );
}

/// Main loop: feed inbound frames to the handler in order, and drain the
/// connection's outbound channel onto the socket.
async fn run_connection(
    handler: &mut ConnectionHandler,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut ws_rx: SplitStream<WebSocket>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(err) = handler.on_message(text.as_str()).await {
                            if !reply_with_error(handler, err) {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %handler.connection_id(), "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            payload = outbound.recv() => {
                let Some(payload) = payload else { break };
                if ws_tx.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    // Flush whatever was queued before the loop ended (e.g. a final error).
    while let Ok(payload) = outbound.try_recv() {
        if ws_tx.send(Message::Text(payload.into())).await.is_err() {
            break;
        }
    }
}

/// Answer a failed inbound message with an error payload. Returns `false`
/// when this connection can no longer be written to.
fn reply_with_error(handler: &ConnectionHandler, err: ChatError) -> bool {
    match &err {
        ChatError::Delivery(cause) => {
            tracing::debug!(
                connection_id = %handler.connection_id(),
                %cause,
                "delivery to own connection failed"
            );
            return false;
        }
        ChatError::Persistence(cause) => {
            tracing::error!(
                connection_id = %handler.connection_id(),
                room = %handler.room_name(),
                %cause,
                "persistence failure while handling message"
            );
        }
        _ => {
            tracing::warn!(
                connection_id = %handler.connection_id(),
                error = %err,
                "rejected inbound message"
            );
        }
    }
    handler.show(&ServerMessage::error(&err)).is_ok()
}
