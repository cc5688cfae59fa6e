// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_DISCONNECTION: &str = "ws.disconnection";
pub const WS_ACTIVE: &str = "ws.active";
pub const AUTH_SUCCESS: &str = "auth.success";
pub const AUTH_FAILURE: &str = "auth.failure";
pub const ROOM_JOINED: &str = "room.joined";
pub const ROOM_LEFT: &str = "room.left";
pub const CHAT_MESSAGE: &str = "chat.message";
pub const CHAT_DELETED: &str = "chat.deleted";
pub const WHITEBOARD_DRAW: &str = "whiteboard.draw";
pub const WHITEBOARD_SAVE: &str = "whiteboard.save";
pub const RATE_LIMITED: &str = "rate.limited";
