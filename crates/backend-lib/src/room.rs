// ============================
// crates/backend-lib/src/room.rs
// ============================
//! Room coordinator: join/leave membership, membership broadcasts and
//! room-state snapshots. Rooms are created implicitly on first join and
//! never explicitly deleted; a room exists while its store keys do.

use crate::broker::Scope;
use crate::connection::{now_ms, ConnectionHandler};
use crate::error::AppError;
use crate::store::SessionStore;
use crate::validation;
use classroom_common::ServerEvent;
use metrics::counter;
use tracing::info;

impl<S: SessionStore> ConnectionHandler<S> {
    pub(crate) async fn handle_join_room(&mut self, room_id: &str) -> Result<(), AppError> {
        let room_id = match validation::validate_room_id(room_id) {
            Ok(id) => id,
            Err(err) => return self.send_error("INVALID_ROOM_ID", &err.to_string()).await,
        };
        let identity = self.identity()?.clone();

        self.state.registry.join_room(room_id, self.conn_id);
        self.rooms.insert(room_id.to_string());
        self.state
            .store
            .add_participant(room_id, &identity.user_id, &identity.user_name)
            .await?;

        counter!(crate::metrics::ROOM_JOINED).increment(1);
        info!(room_id, user_id = %identity.user_id, "user joined room");

        self.publish(
            Scope::RoomExcept {
                room_id: room_id.to_string(),
                conn_id: self.conn_id,
            },
            &ServerEvent::UserJoined {
                user_id: identity.user_id.clone(),
                user_name: identity.user_name.clone(),
                role: identity.user_role,
                timestamp: now_ms(),
            },
        )
        .await?;

        // Snapshot for the joiner only: participants derived from live
        // connections, plus the latest whiteboard if one survives.
        let participants = self.state.registry.live_participants(room_id);
        let whiteboard_state = self.state.store.load_whiteboard(room_id).await?;
        self.send(ServerEvent::RoomState {
            participants,
            whiteboard_state,
        })
        .await
    }

    pub(crate) async fn handle_leave_room(&mut self, room_id: &str) -> Result<(), AppError> {
        let room_id = match validation::validate_room_id(room_id) {
            Ok(id) => id,
            Err(err) => return self.send_error("INVALID_ROOM_ID", &err.to_string()).await,
        };
        if !self.rooms.remove(room_id) {
            // never joined (or already left): nothing to clean up, and the
            // room's members must not see a phantom departure
            return self
                .send_error("NOT_IN_ROOM", "connection has not joined this room")
                .await;
        }
        self.leave_room_inner(room_id).await
    }

    /// Shared by explicit leave and disconnect cleanup.
    pub(crate) async fn leave_room_inner(&self, room_id: &str) -> Result<(), AppError> {
        let identity = self.identity()?.clone();

        self.state.registry.leave_room(room_id, self.conn_id);
        self.state
            .store
            .remove_participant(room_id, &identity.user_id)
            .await?;

        counter!(crate::metrics::ROOM_LEFT).increment(1);
        info!(room_id, user_id = %identity.user_id, "user left room");

        // Registry removal already happened, so a plain room scope reaches
        // exactly the remaining members.
        self.publish(
            Scope::Room {
                room_id: room_id.to_string(),
            },
            &ServerEvent::UserLeft {
                user_id: identity.user_id,
                timestamp: now_ms(),
            },
        )
        .await
    }

    /// Read-only snapshot; membership is not required.
    pub(crate) async fn handle_get_room_info(&self, room_id: &str) -> Result<(), AppError> {
        let room_id = match validation::validate_room_id(room_id) {
            Ok(id) => id,
            Err(err) => return self.send_error("INVALID_ROOM_ID", &err.to_string()).await,
        };
        self.identity()?;

        let participants = self.state.registry.live_participants(room_id);
        let whiteboard_state = self.state.store.load_whiteboard(room_id).await?;
        self.send(ServerEvent::RoomState {
            participants,
            whiteboard_state,
        })
        .await
    }
}
