// ============================
// crates/backend-lib/src/chat.rs
// ============================
//! Chat channel: room messages, typing indicators and moderator deletes.
//! Messages are not persisted; only a monotonic per-room counter survives
//! in the store, used to mint unique message ids.

use crate::broker::Scope;
use crate::connection::{now_ms, ConnectionHandler};
use crate::error::AppError;
use crate::store::SessionStore;
use crate::validation::{self, ValidationError};
use classroom_common::ServerEvent;
use metrics::counter;
use tracing::debug;

impl<S: SessionStore> ConnectionHandler<S> {
    pub(crate) async fn handle_chat_message(
        &self,
        room_id: &str,
        text: &str,
    ) -> Result<(), AppError> {
        let room_id = match validation::validate_room_id(room_id) {
            Ok(id) => id,
            Err(err) => return self.send_error("INVALID_ROOM_ID", &err.to_string()).await,
        };
        let identity = self.identity()?.clone();

        let allowed = self
            .state
            .rate_limiter
            .check(&self.state.store, &identity.user_id, "chat-message")
            .await?;
        if !allowed {
            return self
                .send(ServerEvent::RateLimitExceeded {
                    event_name: "chat-message".to_string(),
                })
                .await;
        }

        let text = match validation::validate_chat_text(text) {
            Ok(Some(text)) => text,
            // Whitespace-only input is dropped without a reply.
            Ok(None) => return Ok(()),
            Err(err @ ValidationError::MessageTooLong(_)) => {
                return self.send_error("MESSAGE_TOO_LONG", &err.to_string()).await;
            },
            Err(err) => return self.send_error("INVALID_MESSAGE", &err.to_string()).await,
        };

        let seq = self.state.store.next_message_seq(room_id).await?;
        counter!(crate::metrics::CHAT_MESSAGE).increment(1);

        // The sender sees their message echoed back too, with its final id.
        self.publish(
            Scope::Room {
                room_id: room_id.to_string(),
            },
            &ServerEvent::NewChatMessage {
                id: format!("{room_id}-{seq}"),
                user_id: identity.user_id,
                user_name: identity.user_name,
                user_role: identity.user_role,
                message: text.to_string(),
                timestamp: now_ms(),
            },
        )
        .await
    }

    pub(crate) async fn handle_chat_delete(
        &self,
        room_id: &str,
        message_id: &str,
    ) -> Result<(), AppError> {
        let room_id = match validation::validate_room_id(room_id) {
            Ok(id) => id,
            Err(err) => return self.send_error("INVALID_ROOM_ID", &err.to_string()).await,
        };
        let identity = self.identity()?.clone();

        if !identity.user_role.is_moderator() {
            // Silent drop keeps the channel free of permission probing.
            debug!(
                room_id,
                user_id = %identity.user_id,
                message_id,
                "delete ignored for non-moderator"
            );
            return Ok(());
        }

        counter!(crate::metrics::CHAT_DELETED).increment(1);

        self.publish(
            Scope::Room {
                room_id: room_id.to_string(),
            },
            &ServerEvent::MessageDeleted {
                message_id: message_id.to_string(),
                deleted_by: identity.user_id,
                timestamp: now_ms(),
            },
        )
        .await
    }

    pub(crate) async fn handle_typing(&self, room_id: &str, started: bool) -> Result<(), AppError> {
        let room_id = match validation::validate_room_id(room_id) {
            Ok(id) => id,
            Err(err) => return self.send_error("INVALID_ROOM_ID", &err.to_string()).await,
        };
        let identity = self.identity()?.clone();

        let event = if started {
            ServerEvent::UserTyping {
                user_id: identity.user_id,
                user_name: identity.user_name,
            }
        } else {
            ServerEvent::UserStoppedTyping {
                user_id: identity.user_id,
            }
        };

        self.publish(
            Scope::RoomExcept {
                room_id: room_id.to_string(),
                conn_id: self.conn_id,
            },
            &event,
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
        let mut learner = authed_client(state, "u1", "Ada", Role::Learner).await;
        let mut educator = authed_client(state, "u2", "Grace", Role::Educator).await;
        join(&mut learner, "room-42").await;
        join(&mut educator, "room-42").await;
        learner.drain();
        (learner, educator)
    }

    #[tokio::test]
    async fn test_message_echoed_to_everyone_with_minted_id() {
        let state = setup();
        let (mut learner, mut educator) = room_with_two(&state).await;

        learner
            .handler
            .handle_event(ClientEvent::ChatMessage {
                room_id: "room-42".to_string(),
                text: "hello class".to_string(),
            })
            .await
            .unwrap();

        for client in [&mut learner, &mut educator] {
            let events = client.drain();
            assert!(matches!(
                &events[..],
                [ServerEvent::NewChatMessage { id, message, user_role, .. }]
                    if id == "room-42-1" && message == "hello class" && *user_role == Role::Learner
            ));
        }
    }

    #[tokio::test]
    async fn test_ids_increment_per_room() {
        let state = setup();
        let (mut learner, mut educator) = room_with_two(&state).await;

        for text in ["one", "two"] {
            learner
                .handler
                .handle_event(ClientEvent::ChatMessage {
                    room_id: "room-42".to_string(),
                    text: text.to_string(),
                })
                .await
                .unwrap();
        }
        learner.drain();

        let events = educator.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ServerEvent::NewChatMessage { id, .. } if id == "room-42-1"));
        assert!(matches!(&events[1], ServerEvent::NewChatMessage { id, .. } if id == "room-42-2"));
    }

    #[tokio::test]
    async fn test_whitespace_only_message_is_dropped() {
        let state = setup();
        let (mut learner, mut educator) = room_with_two(&state).await;

        learner
            .handler
            .handle_event(ClientEvent::ChatMessage {
                room_id: "room-42".to_string(),
                text: "   \n\t ".to_string(),
            })
            .await
            .unwrap();

        assert!(learner.drain().is_empty());
        assert!(educator.drain().is_empty());
        assert_eq!(state.store.message_count("room-42").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_oversized_message_errors_sender_only() {
        let state = setup();
        let (mut learner, mut educator) = room_with_two(&state).await;

        learner
            .handler
            .handle_event(ClientEvent::ChatMessage {
                room_id: "room-42".to_string(),
                text: "x".repeat(1001),
            })
            .await
            .unwrap();

        let events = learner.drain();
        assert!(matches!(
            &events[..],
            [ServerEvent::Error { code, .. }] if code == "MESSAGE_TOO_LONG"
        ));
        assert!(educator.drain().is_empty());
    }

    #[tokio::test]
    async fn test_educator_delete_broadcast_learner_delete_ignored() {
        let state = setup();
        let (mut learner, mut educator) = room_with_two(&state).await;

        learner
            .handler
            .handle_event(ClientEvent::ChatMessage {
                room_id: "room-42".to_string(),
                text: "oops".to_string(),
            })
            .await
            .unwrap();
        learner.drain();
        educator.drain();

        educator
            .handler
            .handle_event(ClientEvent::ChatDeleteMessage {
                room_id: "room-42".to_string(),
                message_id: "room-42-1".to_string(),
            })
            .await
            .unwrap();

        for client in [&mut learner, &mut educator] {
            let events = client.drain();
            assert!(matches!(
                &events[..],
                [ServerEvent::MessageDeleted { message_id, deleted_by, .. }]
                    if message_id == "room-42-1" && deleted_by == "u2"
            ));
        }

        // a learner attempting the same gets nothing, and nothing is broadcast
        learner
            .handler
            .handle_event(ClientEvent::ChatDeleteMessage {
                room_id: "room-42".to_string(),
                message_id: "room-42-1".to_string(),
            })
            .await
            .unwrap();
        assert!(learner.drain().is_empty());
        assert!(educator.drain().is_empty());
    }

    #[tokio::test]
    async fn test_typing_indicators_skip_sender() {
        let state = setup();
        let (mut learner, mut educator) = room_with_two(&state).await;

        learner
            .handler
            .handle_event(ClientEvent::TypingStart {
                room_id: "room-42".to_string(),
            })
            .await
            .unwrap();
        learner
            .handler
            .handle_event(ClientEvent::TypingStop {
                room_id: "room-42".to_string(),
            })
            .await
            .unwrap();

        assert!(learner.drain().is_empty());
        let events = educator.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            ServerEvent::UserTyping { user_id, user_name } if user_id == "u1" && user_name == "Ada"
        ));
        assert!(matches!(
            &events[1],
            ServerEvent::UserStoppedTyping { user_id } if user_id == "u1"
        ));
    }

    #[tokio::test]
    async fn test_message_burst_beyond_ceiling_is_rejected() {
        let state = {
            let mut settings = crate::config::Settings::default();
            settings.rate_limit.max_events = 3;
            Arc::new(AppState::new_local(MemoryStore::new(), settings))
        };
        let (mut learner, mut educator) = room_with_two(&state).await;

        for i in 0..4 {
            learner
                .handler
                .handle_event(ClientEvent::ChatMessage {
                    room_id: "room-42".to_string(),
                    text: format!("msg {i}"),
                })
                .await
                .unwrap();
        }

        let learner_events = learner.drain();
        assert_eq!(learner_events.len(), 4);
        assert!(matches!(
            &learner_events[3],
            ServerEvent::RateLimitExceeded { event_name } if event_name == "chat-message"
        ));
        // only the three accepted messages were fanned out
        assert_eq!(educator.drain().len(), 3);
    }
}
