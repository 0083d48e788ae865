//! Realtime WebSocket endpoint.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use messaging::Gateway;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Query parameters of the upgrade request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Handshake {
    pub phone_number: Option<String>,
}

/// Upgrade to a realtime session.
pub async fn socket(
    State(state): State<AppState>,
    Query(handshake): Query<Handshake>,
    ws: WebSocketUpgrade,
) -> Response {
    let gateway = state.gateway.clone();
    ws.on_upgrade(move |socket| run_session(gateway, socket, handshake.phone_number))
}

/// Pump frames between one socket and the gateway until either side closes.
async fn run_session(gateway: Gateway, socket: WebSocket, phone_number: Option<String>) {
    let mut session = gateway.connect(phone_number.as_deref()).await;
    let session_id = session.id;
    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(event) = session.events.recv().await {
            let frame = match event.to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(session = %session_id, error = %e, "Failed to encode event");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(WsMessage::Text(frame))) => gateway.handle_frame(session_id, &frame).await,
                Some(Ok(WsMessage::Binary(_))) => {
                    debug!(session = %session_id, "Ignoring binary frame");
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(session = %session_id, error = %e, "Socket read failed");
                    break;
                }
            },
            _ = &mut writer => break,
        }
    }

    gateway.disconnect(session_id).await;
    writer.abort();
    info!(session = %session_id, "Session closed");
}
