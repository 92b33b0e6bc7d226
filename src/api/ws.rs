//! Session Endpoint (C13): handshake, join/leave framing, inbound message
//! validation, and wiring into the Communication Hub (§4.11).
//!
//! Every step that touches the database opens a fresh short-lived call --
//! no transaction is ever held across an inbound frame read.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;

use crate::api::types::{InboundFrame, WsHandshakeQuery};
use crate::api::{parse_id, AppState};
use crate::db::models::MessageType;
use crate::hub::CommunicationHub;
use crate::ids::Id;
use crate::services::message_service::MessageService;
use crate::session_registry::SessionHandle;

const CHANNEL_NOT_FOUND_CODE: u16 = 4004;

pub async fn handshake(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Query(query): Query<WsHandshakeQuery>,
) -> Response {
    let channel_id = match parse_id(&channel_id) {
        Ok(id) => id,
        Err(_) => return close_immediately(ws, CHANNEL_NOT_FOUND_CODE, "malformed channel id"),
    };

    match state.db.get_channel(channel_id).await {
        Ok(_) => {}
        Err(_) => return close_immediately(ws, CHANNEL_NOT_FOUND_CODE, "channel not found"),
    }

    ws.on_upgrade(move |socket| run_session(socket, state, channel_id, query.client_id))
}

fn close_immediately(ws: WebSocketUpgrade, code: u16, reason: &'static str) -> Response {
    ws.on_upgrade(move |mut socket: WebSocket| async move {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: reason.into(),
            })))
            .await;
    })
}

async fn run_session(socket: WebSocket, state: AppState, channel_id: Id, client_id: String) {
    let (mut sink, mut stream) = futures::StreamExt::split(socket);
    let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(32);

    state
        .session_registry
        .attach(channel_id, client_id.clone(), SessionHandle::new(tx));

    {
        let hub = CommunicationHub::new(&state.db, &state.bus_publisher, &state.queue);
        if let Err(err) = hub
            .send_system_message(channel_id, &format!("{client_id} joined"))
            .await
        {
            tracing::warn!(%channel_id, %client_id, error = %err, "failed to publish join message");
        }
    }

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let Some(frame) = outbound else { break };
                if futures::SinkExt::send(&mut sink, Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            inbound = futures::StreamExt::next(&mut stream) => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_inbound_frame(&state, channel_id, &client_id, &text, &mut sink).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::warn!(%channel_id, %client_id, error = %err, "session read error");
                        break;
                    }
                }
            }
        }
    }

    state.session_registry.detach(channel_id, &client_id);
    let hub = CommunicationHub::new(&state.db, &state.bus_publisher, &state.queue);
    if let Err(err) = hub
        .send_system_message(channel_id, &format!("{client_id} left"))
        .await
    {
        tracing::warn!(%channel_id, %client_id, error = %err, "failed to publish leave message");
    }
}

async fn handle_inbound_frame(
    state: &AppState,
    channel_id: Id,
    client_id: &str,
    raw: &str,
    sink: &mut (impl futures::Sink<Message> + Unpin),
) {
    let parsed: Result<InboundFrame, _> = serde_json::from_str(raw);
    let Ok(frame) = parsed else {
        let _ = futures::SinkExt::send(sink, Message::Text(error_frame("malformed frame"))).await;
        return;
    };

    if frame.frame_type != "message" || frame.content.trim().is_empty() {
        let _ = futures::SinkExt::send(sink, Message::Text(error_frame("content must be non-empty"))).await;
        return;
    }

    let message_type = match frame.message_type.as_str() {
        "chat" => MessageType::Chat,
        "system" => MessageType::System,
        _ => {
            let _ = futures::SinkExt::send(
                sink,
                Message::Text(error_frame("message_type must be chat or system")),
            )
            .await;
            return;
        }
    };

    let hub = CommunicationHub::new(&state.db, &state.bus_publisher, &state.queue);
    let message = match hub
        .send_channel_message(channel_id, &frame.content, None, Some(client_id), message_type, None)
        .await
    {
        Ok(message) => message,
        Err(err) => {
            let _ = futures::SinkExt::send(sink, Message::Text(error_frame(&err.to_string()))).await;
            return;
        }
    };

    let message_service = MessageService::new(&state.db);
    if let Err(err) = message_service
        .update_read_cursor(channel_id, Id::from_uuid(message.id), None, Some(client_id))
        .await
    {
        tracing::warn!(%channel_id, %client_id, error = %err, "failed to advance read cursor after inbound frame");
    }
}

fn error_frame(detail: &str) -> String {
    serde_json::json!({ "type": "error", "detail": detail }).to_string()
}
