//! Dashboard WebSocket.
//!
//! Every connected client receives every [`DashboardEvent`](crate::events::DashboardEvent)
//! as a JSON text frame. Incoming frames are ignored apart from close.

use crate::{events::DashboardEvent, AppState};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

pub async fn dashboard_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let events = state.events.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, events))
}

async fn handle_socket(socket: WebSocket, mut events: broadcast::Receiver<DashboardEvent>) {
    info!("Dashboard client connected");
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Dashboard client lagging, skipped {} event(s)", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to serialise {} event: {}", event.event_type(), e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Close(_) => break,
                other => debug!("Ignoring dashboard frame: {:?}", other),
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    info!("Dashboard client disconnected");
}
