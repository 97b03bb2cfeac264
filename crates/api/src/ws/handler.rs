use std::time::Instant;

use axum::{
    extract::{Query, State, WebSocketUpgrade, ws::{Message, WebSocket}},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use qrmenu_services::realtime::{
    CloseReason, DeliverySession, HeartbeatConfig, Outbound,
    protocol::{self, events},
    session::TickAction,
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let mut session = DeliverySession::new(
        state.registry.clone(),
        HeartbeatConfig::from(&state.settings.realtime),
    );

    // The credential travels with the upgrade request itself.
    if let Err(e) = session.authenticate(params.token.as_deref(), state.auth.as_ref()) {
        return ApiError::Unauthorized(e.to_string()).into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, session))
}

async fn handle_socket(socket: WebSocket, state: AppState, mut session: DeliverySession) {
    let channel_id = session.channel_id();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(state.settings.realtime.channel_buffer.max(1));

    if let Err(e) = session.activate(tx, state.membership.as_ref()).await {
        warn!(%channel_id, %e, "Channel activation failed");
        let _ = sink.send(Message::Close(None)).await;
        session.close(CloseReason::TransportError);
        return;
    }
    info!(%channel_id, owner_id = ?session.owner_id(), "WebSocket connected");

    let interval = session.heartbeat_config().interval;
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

    let reason = loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(Outbound::Event(text)) => {
                    if let Err(e) = sink.send(Message::text(text)).await {
                        warn!(%channel_id, %e, "WebSocket write failed");
                        break CloseReason::TransportError;
                    }
                }
                Some(Outbound::Close(reason)) => break reason,
                None => break CloseReason::DeliveryFailed,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    session.handle_text(text.as_str(), state.membership.as_ref()).await;
                }
                Some(Ok(Message::Ping(data))) => {
                    session.record_activity(Instant::now());
                    if sink.send(Message::Pong(data)).await.is_err() {
                        break CloseReason::TransportError;
                    }
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Binary(_))) => {
                    session.record_activity(Instant::now());
                }
                Some(Ok(Message::Close(_))) | None => break CloseReason::ClientClosed,
                Some(Err(e)) => {
                    warn!(%channel_id, %e, "WebSocket error");
                    break CloseReason::TransportError;
                }
            },
            _ = ticker.tick() => match session.on_tick(Instant::now()) {
                TickAction::Ping => debug!(%channel_id, "Ping sent"),
                TickAction::Expire => break CloseReason::HeartbeatTimeout,
                TickAction::Stop => break CloseReason::DeliveryFailed,
            },
        }
    };

    // Server-side closes tell the peer why before the close frame.
    if !matches!(reason, CloseReason::ClientClosed | CloseReason::TransportError) {
        let goodbye = protocol::frame(
            events::DISCONNECT,
            &serde_json::json!({ "reason": reason.as_str() }),
        );
        let _ = sink.send(Message::text(goodbye)).await;
        let _ = sink.send(Message::Close(None)).await;
    }

    session.close(reason);
    info!(%channel_id, %reason, "WebSocket disconnected");
}
