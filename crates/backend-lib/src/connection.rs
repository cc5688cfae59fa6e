// ============================
// crates/backend-lib/src/connection.rs
// ============================
//! Per-connection event handler.
//!
//! One `ConnectionHandler` is instantiated per WebSocket connection and
//! owns its ephemeral state: the connection id, the identity bound at
//! `authenticate` time (immutable afterwards) and the set of rooms joined
//! at the transport level. Events are dispatched through an exhaustive
//! `match`; everything except `authenticate` is rejected until an identity
//! is bound. Cross-connection state never lives here — it goes through the
//! session store.

use crate::broker::Scope;
use crate::error::AppError;
use crate::store::SessionStore;
use crate::AppState;
use classroom_common::{ClientEvent, Identity, Role, ServerEvent};
use metrics::counter;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Millisecond timestamp attached to broadcast events.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Handler for a single client connection.
pub struct ConnectionHandler<S> {
    pub(crate) state: Arc<AppState<S>>,
    pub(crate) conn_id: Uuid,
    tx: mpsc::Sender<ServerEvent>,
    identity: Option<Identity>,
    pub(crate) rooms: HashSet<String>,
}

impl<S: SessionStore> ConnectionHandler<S> {
    /// Create a handler and register its outbound channel.
    pub fn new(state: Arc<AppState<S>>, tx: mpsc::Sender<ServerEvent>) -> Self {
        let conn_id = Uuid::new_v4();
        state.registry.register(conn_id, tx.clone());
        Self {
            state,
            conn_id,
            tx,
            identity: None,
            rooms: HashSet::new(),
        }
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    /// The bound identity, or the rejection for pre-auth operations.
    pub(crate) fn identity(&self) -> Result<&Identity, AppError> {
        self.identity.as_ref().ok_or(AppError::Unauthenticated)
    }

    /// Send an event to this connection only.
    pub(crate) async fn send(&self, event: ServerEvent) -> Result<(), AppError> {
        self.tx.send(event).await?;
        Ok(())
    }

    /// Send an `error` event to this connection only.
    pub(crate) async fn send_error(&self, code: &str, message: &str) -> Result<(), AppError> {
        self.send(ServerEvent::Error {
            code: code.to_string(),
            message: message.to_string(),
        })
        .await
    }

    /// Broadcast through the fan-out layer.
    pub(crate) async fn publish(&self, scope: Scope, event: &ServerEvent) -> Result<(), AppError> {
        self.state.broker.publish(scope, event).await
    }

    /// Main entry point: route one inbound event.
    ///
    /// # Errors
    /// A returned error is reported to this connection by the router; only
    /// authentication failures (`AppError::is_fatal`) end the connection.
    pub async fn handle_event(&mut self, event: ClientEvent) -> Result<(), AppError> {
        match event {
            ClientEvent::Authenticate {
                user_id,
                user_name,
                user_role,
            } => self.authenticate(user_id, user_name, user_role).await,

            // Nothing below runs before authentication succeeds.
            _ if self.identity.is_none() => {
                self.send_error("UNAUTHENTICATED", "authenticate first")
                    .await
            },

            ClientEvent::JoinRoom { room_id } => self.handle_join_room(&room_id).await,
            ClientEvent::LeaveRoom { room_id } => self.handle_leave_room(&room_id).await,
            ClientEvent::GetRoomInfo { room_id } => self.handle_get_room_info(&room_id).await,

            ClientEvent::WhiteboardDraw { room_id, draw_op } => {
                self.handle_whiteboard_draw(&room_id, draw_op).await
            },
            ClientEvent::WhiteboardSave { room_id, snapshot } => {
                self.handle_whiteboard_save(&room_id, &snapshot).await
            },
            ClientEvent::WhiteboardClear { room_id } => {
                self.handle_whiteboard_clear(&room_id).await
            },
            ClientEvent::WhiteboardUndo { room_id } => self.handle_whiteboard_undo(&room_id).await,
            ClientEvent::WhiteboardToolChange {
                room_id,
                tool,
                color,
            } => self.handle_tool_change(&room_id, &tool, &color).await,

            ClientEvent::ChatMessage { room_id, text } => {
                self.handle_chat_message(&room_id, &text).await
            },
            ClientEvent::ChatDeleteMessage {
                room_id,
                message_id,
            } => self.handle_chat_delete(&room_id, &message_id).await,
            ClientEvent::TypingStart { room_id } => self.handle_typing(&room_id, true).await,
            ClientEvent::TypingStop { room_id } => self.handle_typing(&room_id, false).await,

            ClientEvent::Online => self.handle_online().await,
            ClientEvent::Offline => self.handle_offline().await,
            ClientEvent::Away => self.handle_away().await,
            ClientEvent::Ping => self.handle_ping().await,
        }
    }

    /// Bind the pre-resolved identity to this connection.
    async fn authenticate(
        &mut self,
        user_id: String,
        user_name: String,
        user_role: Role,
    ) -> Result<(), AppError> {
        if self.identity.is_some() {
            return self
                .send_error("ALREADY_AUTHENTICATED", "identity is already bound")
                .await;
        }

        let user_id = user_id.trim().to_string();
        let user_name = user_name.trim().to_string();
        if user_id.is_empty() || user_name.is_empty() {
            counter!(crate::metrics::AUTH_FAILURE).increment(1);
            self.send(ServerEvent::AuthError {
                message: "userId and userName are required".to_string(),
            })
            .await?;
            // Fatal: the router terminates the connection after this.
            return Err(AppError::Auth("missing identity fields".to_string()));
        }

        let identity = Identity {
            user_id,
            user_name,
            user_role,
        };

        self.state
            .store
            .set_active_user(&identity.user_id, &self.conn_id.to_string())
            .await?;
        self.state.registry.bind_identity(self.conn_id, &identity);
        self.identity = Some(identity.clone());

        counter!(crate::metrics::AUTH_SUCCESS).increment(1);
        info!(conn_id = %self.conn_id, user_id = %identity.user_id, "connection authenticated");

        self.send(ServerEvent::Authenticated {
            user_id: identity.user_id,
            user_name: identity.user_name,
            user_role: identity.user_role,
        })
        .await
    }

    /// Compensating cleanup on socket teardown, normal or abrupt. The
    /// router runs this exactly once; every joined room is left with the
    /// same logic as an explicit leave, and the active-user entry is
    /// removed. Failures are logged, never propagated — a disconnect is
    /// not an error.
    pub async fn disconnect(&mut self) {
        let rooms: Vec<String> = self.rooms.drain().collect();
        for room_id in rooms {
            if let Err(err) = self.leave_room_inner(&room_id).await {
                warn!(conn_id = %self.conn_id, room_id, %err, "room cleanup failed on disconnect");
            }
        }

        if let Some(identity) = &self.identity {
            if let Err(err) = self.state.store.remove_active_user(&identity.user_id).await {
                warn!(conn_id = %self.conn_id, %err, "active-user cleanup failed on disconnect");
            }
        }

        self.state.registry.unregister(self.conn_id);
        info!(conn_id = %self.conn_id, "connection closed");
    }
}
