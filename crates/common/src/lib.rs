// ================
// common/src/lib.rs
// ================
//! Wire protocol shared between the classroom collaboration server and its
//! clients. Every frame on the socket is a JSON object tagged with an
//! `event` field; inbound and outbound events are closed enums so handlers
//! dispatch with an exhaustive `match` instead of string-keyed listeners.

use serde::{Deserialize, Serialize};

/// Authenticated role of a connected user.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Learner,
    Educator,
    Parent,
    Admin,
}

impl Role {
    /// Roles allowed to retract chat messages for a whole room.
    pub fn is_moderator(self) -> bool {
        matches!(self, Role::Educator | Role::Admin)
    }
}

/// Identity bound to a connection after a successful `authenticate`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub user_name: String,
    pub user_role: Role,
}

/// A single room member as reported in `room-state`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    pub user_name: String,
}

/// Events consumed from clients.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Bind a pre-resolved identity to this connection. Must be the first
    /// event on the socket; everything else is rejected until it succeeds.
    Authenticate {
        user_id: String,
        user_name: String,
        user_role: Role,
    },
    JoinRoom {
        room_id: String,
    },
    LeaveRoom {
        room_id: String,
    },
    /// Read-only room snapshot, callable without membership.
    GetRoomInfo {
        room_id: String,
    },
    /// Relay a draw/erase operation; never persisted individually.
    WhiteboardDraw {
        room_id: String,
        draw_op: serde_json::Value,
    },
    /// Overwrite the room's stored snapshot wholesale.
    WhiteboardSave {
        room_id: String,
        snapshot: String,
    },
    WhiteboardClear {
        room_id: String,
    },
    WhiteboardUndo {
        room_id: String,
    },
    WhiteboardToolChange {
        room_id: String,
        tool: String,
        color: String,
    },
    ChatMessage {
        room_id: String,
        text: String,
    },
    ChatDeleteMessage {
        room_id: String,
        message_id: String,
    },
    TypingStart {
        room_id: String,
    },
    TypingStop {
        room_id: String,
    },
    Online,
    Offline,
    Away,
    /// Liveness probe, acknowledged directly with `pong`.
    Ping,
}

/// Events produced by the server.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    Authenticated {
        user_id: String,
        user_name: String,
        user_role: Role,
    },
    AuthError {
        message: String,
    },
    UserJoined {
        user_id: String,
        user_name: String,
        role: Role,
        timestamp: i64,
    },
    UserLeft {
        user_id: String,
        timestamp: i64,
    },
    /// Full room snapshot delivered to a joining connection (and on
    /// `get-room-info`).
    RoomState {
        participants: Vec<Participant>,
        whiteboard_state: Option<String>,
    },
    WhiteboardUpdate {
        user_id: String,
        user_name: String,
        draw_op: serde_json::Value,
        timestamp: i64,
    },
    WhiteboardCleared {
        user_id: String,
        timestamp: i64,
    },
    WhiteboardSaved {
        success: bool,
    },
    WhiteboardUndoTrigger {
        user_id: String,
        timestamp: i64,
    },
    UserToolChanged {
        user_id: String,
        tool: String,
        color: String,
        timestamp: i64,
    },
    NewChatMessage {
        id: String,
        user_id: String,
        user_name: String,
        user_role: Role,
        message: String,
        timestamp: i64,
    },
    UserTyping {
        user_id: String,
        user_name: String,
    },
    UserStoppedTyping {
        user_id: String,
    },
    MessageDeleted {
        message_id: String,
        deleted_by: String,
        timestamp: i64,
    },
    UserOnline {
        user_id: String,
        user_name: String,
        timestamp: i64,
    },
    UserOffline {
        user_id: String,
        timestamp: i64,
    },
    UserAway {
        user_id: String,
        timestamp: i64,
    },
    // the payload field cannot be called `event`: that key is the frame tag
    RateLimitExceeded {
        event_name: String,
    },
    Pong {
        timestamp: i64,
    },
    Error {
        code: String,
        message: String,
    },
}
