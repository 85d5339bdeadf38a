use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::connection_manager::ConnectionHandle;
use crate::metrics::{
    DISCONNECTS_TOTAL, HEARTBEATS_TOTAL, HISTORY_REQUESTS_TOTAL, STORE_ERRORS_TOTAL,
    WS_CONNECTIONS_CLOSED, WS_CONNECTIONS_OPENED, WS_CONNECTION_DURATION,
};
use crate::server::AppState;

use super::message::{ClientMessage, ServerMessage};

const CHANNEL_BUFFER_SIZE: usize = 32;

/// WebSocket upgrade handler.
///
/// Visitors and dashboards share the endpoint; no authentication, nothing
/// identifying is exchanged at upgrade time.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection
#[tracing::instrument(name = "ws.connection", skip(socket, state), fields(otel.kind = "server"))]
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_start = std::time::Instant::now();

    // Create channel for sending messages to this connection
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(CHANNEL_BUFFER_SIZE);

    let handle = state.connection_manager.register(tx);
    let connection_id = handle.id;

    WS_CONNECTIONS_OPENED.inc();

    // Acknowledge the connection before any other traffic
    let _ = handle.send(ServerMessage::ConnectionAck).await;

    tracing::info!(connection_id = %connection_id, "WebSocket connection established");

    // Split socket into sender and receiver
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task for sending messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize message");
                    continue;
                }
            };

            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Task for receiving messages from WebSocket
    let state_clone = state.clone();
    let handle_clone = handle.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) => {
                    if !process_message(msg, &state_clone, &handle_clone).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task completed");
        }
        _ = recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task completed");
        }
    }

    // Unregister the connection, then clean up any presence state it left
    // behind. Implicit close and explicit disconnect take the same path.
    state.connection_manager.unregister(connection_id);
    if let Err(e) = state.tracker.record_disconnect(connection_id).await {
        STORE_ERRORS_TOTAL.inc();
        tracing::error!(connection_id = %connection_id, error = %e, "Disconnect cleanup failed");
    }

    WS_CONNECTIONS_CLOSED.inc();
    let duration = connection_start.elapsed().as_secs_f64();
    WS_CONNECTION_DURATION.observe(duration);

    tracing::info!(
        connection_id = %connection_id,
        duration_secs = duration,
        "WebSocket connection closed"
    );
}

/// Process a received WebSocket message
/// Returns false if the connection should be closed
async fn process_message(msg: Message, state: &AppState, handle: &Arc<ConnectionHandle>) -> bool {
    match msg {
        Message::Text(text) => {
            handle.update_activity().await;

            // Parse client message
            let client_msg: ClientMessage = match serde_json::from_str(&text) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse client message");
                    let _ = handle
                        .send(ServerMessage::error("INVALID_MESSAGE", e.to_string()))
                        .await;
                    return true;
                }
            };

            // Handle the message
            handle_client_message(client_msg, state, handle).await;
            true
        }
        Message::Binary(_) => {
            // Binary messages not supported
            let _ = handle
                .send(ServerMessage::error(
                    "UNSUPPORTED_FORMAT",
                    "Binary messages are not supported",
                ))
                .await;
            true
        }
        Message::Ping(_) => {
            handle.update_activity().await;
            // Axum answers the pong itself
            true
        }
        Message::Pong(_) => {
            handle.update_activity().await;
            true
        }
        Message::Close(_) => {
            tracing::debug!(connection_id = %handle.id, "Received close frame");
            false
        }
    }
}

/// Handle a parsed client message.
///
/// Every downstream failure is logged and contained here; one bad event must
/// never close the connection or disturb other sessions.
#[tracing::instrument(
    name = "ws.message",
    skip(state, handle),
    fields(connection_id = %handle.id, message_type = ?msg)
)]
async fn handle_client_message(
    msg: ClientMessage,
    state: &AppState,
    handle: &Arc<ConnectionHandle>,
) {
    match msg {
        ClientMessage::Heartbeat(data) => {
            HEARTBEATS_TOTAL.inc();
            if let Err(e) = state.tracker.record_heartbeat(handle.id, &data).await {
                STORE_ERRORS_TOTAL.inc();
                tracing::error!(connection_id = %handle.id, error = %e, "Error handling heartbeat");
            }
        }
        ClientMessage::Disconnect => {
            DISCONNECTS_TOTAL.inc();
            if let Err(e) = state.tracker.record_disconnect(handle.id).await {
                STORE_ERRORS_TOTAL.inc();
                tracing::error!(connection_id = %handle.id, error = %e, "Error handling disconnect");
            }
        }
        ClientMessage::Subscribe => {
            state.connection_manager.subscribe(handle.id);

            // New subscribers get one immediate snapshot; after that they
            // ride the broadcast ticks
            match state
                .aggregator
                .compute_snapshot(Utc::now().timestamp_millis())
                .await
            {
                Ok(stats) => {
                    let _ = handle.send(ServerMessage::stats_update(stats)).await;
                }
                Err(e) => {
                    STORE_ERRORS_TOTAL.inc();
                    tracing::error!(connection_id = %handle.id, error = %e, "Initial snapshot failed");
                }
            }
        }
        ClientMessage::Unsubscribe => {
            state.connection_manager.unsubscribe(handle.id);
        }
        ClientMessage::HistoryRequest { range } => {
            HISTORY_REQUESTS_TOTAL.inc();
            match state
                .sampler
                .history(range, Utc::now().timestamp_millis())
                .await
            {
                Ok(stats) => {
                    let _ = handle.send(ServerMessage::history_response(stats)).await;
                }
                Err(e) => {
                    STORE_ERRORS_TOTAL.inc();
                    tracing::error!(
                        connection_id = %handle.id,
                        range = %range,
                        error = %e,
                        "Error fetching historical data"
                    );
                    let _ = handle.send(ServerMessage::history_error(e.to_string())).await;
                }
            }
        }
    }
}
