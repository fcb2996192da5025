//! WebSocket lifecycle for game clients.
//!
//! A connection identifies itself through the `roomId` and `userId` query
//! parameters of the upgrade request. Registration is what makes the client
//! reachable by the fan-out layer; the inbound direction only carries
//! liveness probes, because game actions travel over the REST surface.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        format_system_time,
        ws::{ClientMessage, ConnectedAck, PushEnvelope},
    },
    state::SharedState,
};

const OUTBOUND_BUFFER: usize = 32;

/// Handle the full lifecycle for an individual game WebSocket connection.
pub async fn handle_socket(state: SharedState, mut socket: WebSocket, room_id: String, user_id: String) {
    let Some(backends) = state.backends().await else {
        warn!(room_id, user_id, "rejecting websocket: storage degraded");
        let _ = socket.close().await;
        return;
    };
    match backends.rooms.find_room(room_id.clone()).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!(room_id, user_id, "rejecting websocket: unknown room");
            let _ = socket.close().await;
            return;
        }
        Err(err) => {
            warn!(room_id, user_id, error = %err, "rejecting websocket: room lookup failed");
            let _ = socket.close().await;
            return;
        }
    }

    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);

    // Dedicated writer task keeps outbound pushes flowing even while we await
    // inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id = Uuid::new_v4();
    state.connections().register(
        connection_id,
        room_id.clone(),
        user_id.clone(),
        outbound_tx.clone(),
    );
    if let Err(err) = backends
        .rooms
        .set_participant_connected(room_id.clone(), user_id.clone(), true)
        .await
    {
        warn!(room_id, user_id, error = %err, "failed to flag participant connected");
    }
    info!(connection_id = %connection_id, room_id, user_id, "client connected");

    let ack = ConnectedAck {
        connection_id,
        room_id: room_id.clone(),
        user_id: user_id.clone(),
    };
    send_enveloped(&outbound_tx, "connected", &ack).await;

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Ping) => {
                    send_enveloped(&outbound_tx, "pong", &serde_json::json!({})).await;
                }
                Ok(ClientMessage::Unknown) => {
                    debug!(connection_id = %connection_id, "ignoring unknown client message");
                }
                Err(err) => {
                    warn!(connection_id = %connection_id, error = %err, "failed to parse client message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload)).await;
            }
            Ok(Message::Close(frame)) => {
                debug!(connection_id = %connection_id, "client closed");
                let _ = outbound_tx.send(Message::Close(frame)).await;
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection_id = %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.connections().unregister(connection_id);
    if let Err(err) = backends
        .rooms
        .set_participant_connected(room_id.clone(), user_id.clone(), false)
        .await
    {
        warn!(room_id, user_id, error = %err, "failed to flag participant disconnected");
    }
    info!(connection_id = %connection_id, room_id, user_id, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Serialize a payload into the push envelope and queue it on this
/// connection's writer. Failures only mean the connection is going away.
async fn send_enveloped<T: Serialize>(tx: &mpsc::Sender<Message>, event: &str, payload: &T) {
    let envelope = PushEnvelope {
        event,
        timestamp: format_system_time(std::time::SystemTime::now()),
        data: payload,
    };
    match serde_json::to_string(&envelope) {
        Ok(text) => {
            let _ = tx.send(Message::Text(text.into())).await;
        }
        Err(err) => {
            warn!(event, error = %err, "failed to serialize websocket payload");
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::Sender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
