// ============================
// crates/backend-lib/src/whiteboard.rs
// ============================
//! Whiteboard channel: relays draw operations and owns the durable
//! snapshot. Individual draw ops are never persisted; only wholesale
//! snapshots are, with a TTL. Storage failures are reported to the sender
//! and never reach other members.

use crate::broker::Scope;
use crate::connection::{now_ms, ConnectionHandler};
use crate::error::AppError;
use crate::store::SessionStore;
use crate::validation;
use classroom_common::ServerEvent;
use metrics::counter;
use serde_json::Value;
use tracing::warn;

impl<S: SessionStore> ConnectionHandler<S> {
    pub(crate) async fn handle_whiteboard_draw(
        &self,
        room_id: &str,
        draw_op: Value,
    ) -> Result<(), AppError> {
        let room_id = match validation::validate_room_id(room_id) {
            Ok(id) => id,
            Err(err) => return self.send_error("INVALID_ROOM_ID", &err.to_string()).await,
        };
        let identity = self.identity()?.clone();

        let allowed = self
            .state
            .rate_limiter
            .check(&self.state.store, &identity.user_id, "whiteboard-draw")
            .await?;
        if !allowed {
            return self
                .send(ServerEvent::RateLimitExceeded {
                    event_name: "whiteboard-draw".to_string(),
                })
                .await;
        }

        counter!(crate::metrics::WHITEBOARD_DRAW).increment(1);

        // The sender already has this op locally.
        self.publish(
            Scope::RoomExcept {
                room_id: room_id.to_string(),
                conn_id: self.conn_id,
            },
            &ServerEvent::WhiteboardUpdate {
                user_id: identity.user_id,
                user_name: identity.user_name,
                draw_op,
                timestamp: now_ms(),
            },
        )
        .await
    }

    pub(crate) async fn handle_whiteboard_save(
        &self,
        room_id: &str,
        snapshot: &str,
    ) -> Result<(), AppError> {
        let room_id = match validation::validate_room_id(room_id) {
            Ok(id) => id,
            Err(err) => return self.send_error("INVALID_ROOM_ID", &err.to_string()).await,
        };
        self.identity()?;

        let success = match self
            .state
            .store
            .save_whiteboard(room_id, snapshot, self.state.whiteboard_ttl())
            .await
        {
            Ok(()) => {
                counter!(crate::metrics::WHITEBOARD_SAVE).increment(1);
                true
            },
            Err(err) => {
                warn!(room_id, %err, "whiteboard save failed");
                false
            },
        };

        self.send(ServerEvent::WhiteboardSaved { success }).await
    }

    pub(crate) async fn handle_whiteboard_clear(&self, room_id: &str) -> Result<(), AppError> {
        let room_id = match validation::validate_room_id(room_id) {
            Ok(id) => id,
            Err(err) => return self.send_error("INVALID_ROOM_ID", &err.to_string()).await,
        };
        let identity = self.identity()?.clone();

        if let Err(err) = self.state.store.clear_whiteboard(room_id).await {
            // Members must keep their local state when the authoritative
            // clear did not happen.
            warn!(room_id, %err, "whiteboard clear failed");
            return self
                .send_error("STORE_ERROR", &err.sanitized_message())
                .await;
        }

        // Full reset: everyone discards local state, sender included.
        self.publish(
            Scope::Room {
                room_id: room_id.to_string(),
            },
            &ServerEvent::WhiteboardCleared {
                user_id: identity.user_id,
                timestamp: now_ms(),
            },
        )
        .await
    }

    pub(crate) async fn handle_whiteboard_undo(&self, room_id: &str) -> Result<(), AppError> {
        let room_id = match validation::validate_room_id(room_id) {
            Ok(id) => id,
            Err(err) => return self.send_error("INVALID_ROOM_ID", &err.to_string()).await,
        };
        let identity = self.identity()?.clone();

        // No server-side history stack; clients replay their own.
        self.publish(
            Scope::RoomExcept {
                room_id: room_id.to_string(),
                conn_id: self.conn_id,
            },
            &ServerEvent::WhiteboardUndoTrigger {
                user_id: identity.user_id,
                timestamp: now_ms(),
            },
        )
        .await
    }

    pub(crate) async fn handle_tool_change(
        &self,
        room_id: &str,
        tool: &str,
        color: &str,
    ) -> Result<(), AppError> {
        let room_id = match validation::validate_room_id(room_id) {
            Ok(id) => id,
            Err(err) => return self.send_error("INVALID_ROOM_ID", &err.to_string()).await,
        };
        let identity = self.identity()?.clone();

        self.publish(
            Scope::RoomExcept {
                room_id: room_id.to_string(),
                conn_id: self.conn_id,
            },
            &ServerEvent::UserToolChanged {
                user_id: identity.user_id,
                tool: tool.to_string(),
                color: color.to_string(),
                timestamp: now_ms(),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tests::{authed_client, setup, TestClient};
    use crate::store::MemoryStore;
    use crate::AppState;
    use classroom_common::{ClientEvent, Role};
    use std::sync::Arc;

    async fn join(client: &mut TestClient<MemoryStore>, room_id: &str) {
        client
            .handler
            .handle_event(ClientEvent::JoinRoom {
                room_id: room_id.to_string(),
            })
            .await
            .unwrap();
        client.drain();
    }

    async fn room_with_two(
        state: &Arc<AppState<MemoryStore>>,
    ) -> (TestClient<MemoryStore>, TestClient<MemoryStore>) {
        let mut a = authed_client(state, "u1", "Ada", Role::Learner).await;
        let mut b = authed_client(state, "u2", "Grace", Role::Educator).await;
        join(&mut a, "room-42").await;
        join(&mut b, "room-42").await;
        a.drain();
        (a, b)
    }

    #[tokio::test]
    async fn test_draw_relayed_to_others_only() {
        let state = setup();
        let (mut a, mut b) = room_with_two(&state).await;

        a.handler
            .handle_event(ClientEvent::WhiteboardDraw {
                room_id: "room-42".to_string(),
                draw_op: serde_json::json!({"type":"line","from":[0,0],"to":[5,5]}),
            })
            .await
            .unwrap();

        assert!(a.drain().is_empty(), "sender already has local state");
        let b_events = b.drain();
        assert!(matches!(
            &b_events[..],
            [ServerEvent::WhiteboardUpdate { user_id, .. }] if user_id == "u1"
        ));
    }

    #[tokio::test]
    async fn test_save_acknowledges_sender_only() {
        let state = setup();
        let (mut a, mut b) = room_with_two(&state).await;

        a.handler
            .handle_event(ClientEvent::WhiteboardSave {
                room_id: "room-42".to_string(),
                snapshot: r#"{"shapes":[1,2,3]}"#.to_string(),
            })
            .await
            .unwrap();

        let a_events = a.drain();
        assert!(matches!(
            &a_events[..],
            [ServerEvent::WhiteboardSaved { success: true }]
        ));
        assert!(b.drain().is_empty());

        assert_eq!(
            state.store.load_whiteboard("room-42").await.unwrap().as_deref(),
            Some(r#"{"shapes":[1,2,3]}"#)
        );
    }

    #[tokio::test]
    async fn test_clear_reaches_everyone_and_nulls_snapshot() {
        let state = setup();
        let (mut a, mut b) = room_with_two(&state).await;

        a.handler
            .handle_event(ClientEvent::WhiteboardSave {
                room_id: "room-42".to_string(),
                snapshot: "snap".to_string(),
            })
            .await
            .unwrap();
        a.drain();

        a.handler
            .handle_event(ClientEvent::WhiteboardClear {
                room_id: "room-42".to_string(),
            })
            .await
            .unwrap();

        // everyone must discard local state, sender included
        assert!(matches!(
            &a.drain()[..],
            [ServerEvent::WhiteboardCleared { .. }]
        ));
        assert!(matches!(
            &b.drain()[..],
            [ServerEvent::WhiteboardCleared { .. }]
        ));

        // clear followed by get-room-info reports a null whiteboard
        a.handler
            .handle_event(ClientEvent::GetRoomInfo {
                room_id: "room-42".to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(
            &a.drain()[..],
            [ServerEvent::RoomState {
                whiteboard_state: None,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn test_undo_and_tool_change_are_stateless_relays() {
        let state = setup();
        let (mut a, mut b) = room_with_two(&state).await;

        a.handler
            .handle_event(ClientEvent::WhiteboardUndo {
                room_id: "room-42".to_string(),
            })
            .await
            .unwrap();
        a.handler
            .handle_event(ClientEvent::WhiteboardToolChange {
                room_id: "room-42".to_string(),
                tool: "eraser".to_string(),
                color: "#000000".to_string(),
            })
            .await
            .unwrap();

        assert!(a.drain().is_empty());
        let b_events = b.drain();
        assert_eq!(b_events.len(), 2);
        assert!(matches!(b_events[0], ServerEvent::WhiteboardUndoTrigger { .. }));
        assert!(matches!(
            &b_events[1],
            ServerEvent::UserToolChanged { tool, .. } if tool == "eraser"
        ));
    }

    #[tokio::test]
    async fn test_draw_rate_limit_stops_broadcast() {
        let state = {
            let mut settings = crate::config::Settings::default();
            settings.rate_limit.max_events = 2;
            Arc::new(AppState::new_local(MemoryStore::new(), settings))
        };
        let (mut a, mut b) = room_with_two(&state).await;

        for _ in 0..2 {
            a.handler
                .handle_event(ClientEvent::WhiteboardDraw {
                    room_id: "room-42".to_string(),
                    draw_op: serde_json::json!({}),
                })
                .await
                .unwrap();
        }
        b.drain();

        a.handler
            .handle_event(ClientEvent::WhiteboardDraw {
                room_id: "room-42".to_string(),
                draw_op: serde_json::json!({}),
            })
            .await
            .unwrap();

        assert!(matches!(
            &a.drain()[..],
            [ServerEvent::RateLimitExceeded { event_name }] if event_name == "whiteboard-draw"
        ));
        assert!(b.drain().is_empty(), "rejected draw is not broadcast");
    }
}
