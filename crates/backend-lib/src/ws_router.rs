// ============================
// crates/backend-lib/src/ws_router.rs
// ============================
//! WebSocket router and connection handling.
//!
//! Wire format is JSON text frames tagged by an `event` field. A malformed
//! frame earns an `error` event, never a disconnect; only authentication
//! failures end the connection from the server side.

use crate::connection::ConnectionHandler;
use crate::http;
use crate::store::SessionStore;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use classroom_common::ClientEvent;
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Create the full application router: the WebSocket endpoint plus the
/// plain HTTP surface.
pub fn create_router<S: SessionStore + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(http::health))
        .route("/metrics", get(http::metrics_report))
        .route("/rooms/{room_id}", get(http::room_summary))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler for WebSocket upgrade requests
pub async fn ws_handler<S: SessionStore + 'static>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection<S: SessionStore + 'static>(socket: WebSocket, state: Arc<AppState<S>>) {
    // counted only once the upgrade actually completed, so an abandoned
    // handshake cannot drift the active gauge
    counter!(crate::metrics::WS_CONNECTION).increment(1);
    gauge!(crate::metrics::WS_ACTIVE).increment(1.0);

    let (mut socket_tx, mut socket_rx) = socket.split();

    // Outbound channel: everything addressed to this connection, whether
    // a direct reply or a broadcast, funnels through here.
    let (event_tx, mut event_rx) = mpsc::channel(32);
    let mut handler = ConnectionHandler::new(state, event_tx);
    let conn_id = handler.conn_id();

    let send_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(%err, "outbound event failed to serialize");
                    continue;
                },
            };
            if socket_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = socket_rx.next().await {
        match message {
            Message::Text(text) => {
                let event = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => event,
                    Err(err) => {
                        debug!(%conn_id, %err, "malformed client frame");
                        if handler
                            .send_error("MALFORMED_EVENT", "unrecognized event payload")
                            .await
                            .is_err()
                        {
                            break;
                        }
                        continue;
                    },
                };

                if let Err(err) = handler.handle_event(event).await {
                    let fatal = err.is_fatal();
                    let _ = handler
                        .send_error(err.error_code(), &err.sanitized_message())
                        .await;
                    if fatal {
                        break;
                    }
                }
            },
            Message::Close(_) => break,
            // axum answers pings itself; binary frames are not part of the
            // protocol and are dropped.
            _ => {},
        }
    }

    handler.disconnect().await;
    send_task.abort();

    counter!(crate::metrics::WS_DISCONNECTION).increment(1);
    gauge!(crate::metrics::WS_ACTIVE).decrement(1.0);
}
