// ============================
// crates/backend-lib/src/store/mod.rs
// ============================
//! Session Store abstraction.
//!
//! The store is the single source of truth for cross-connection state:
//! per-room participant sets, whiteboard snapshots, message counters, rate
//! counters and the global active-user directory. Every mutation is a
//! single atomic store operation; handler code never read-modify-writes
//! shared state, so concurrent connections in one room cannot lose updates.
//!
//! Two implementations exist behind the same trait: [`RedisStore`] for
//! deployments and [`MemoryStore`] as an in-process fake for tests and
//! single-node development. Which one runs is an explicit configuration
//! choice; no business logic branches on the backend.

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

use crate::error::AppError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Shared key-value/set backend for collaboration state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Upsert a user into a room's participant set. A user id maps to at
    /// most one display name per room; last join wins.
    async fn add_participant(
        &self,
        room_id: &str,
        user_id: &str,
        user_name: &str,
    ) -> Result<(), AppError>;

    /// Remove a user from a room's participant set.
    async fn remove_participant(&self, room_id: &str, user_id: &str) -> Result<(), AppError>;

    /// Stored participant set for a room, `user_id -> user_name`.
    async fn participants(&self, room_id: &str) -> Result<HashMap<String, String>, AppError>;

    /// Overwrite the room's whiteboard snapshot wholesale, refreshing its
    /// expiry. Last writer wins; there is no diffing.
    async fn save_whiteboard(
        &self,
        room_id: &str,
        snapshot: &str,
        ttl: Duration,
    ) -> Result<(), AppError>;

    /// Latest whiteboard snapshot, if one exists and has not expired.
    async fn load_whiteboard(&self, room_id: &str) -> Result<Option<String>, AppError>;

    /// Drop the room's whiteboard snapshot; subsequent loads return `None`.
    async fn clear_whiteboard(&self, room_id: &str) -> Result<(), AppError>;

    /// Atomically increment and return the room's message counter.
    async fn next_message_seq(&self, room_id: &str) -> Result<u64, AppError>;

    /// Current value of the room's message counter.
    async fn message_count(&self, room_id: &str) -> Result<u64, AppError>;

    /// Atomically increment the per-(user, event) rate counter, starting
    /// the expiry window when the counter is created. The returned value is
    /// the post-increment count within the current window.
    async fn incr_event_count(
        &self,
        user_id: &str,
        event: &str,
        window: Duration,
    ) -> Result<u64, AppError>;

    /// Register a user in the global active-user directory.
    async fn set_active_user(&self, user_id: &str, conn_id: &str) -> Result<(), AppError>;

    /// Remove a user from the global active-user directory.
    async fn remove_active_user(&self, user_id: &str) -> Result<(), AppError>;

    /// Connectivity probe used by the metrics endpoint.
    async fn ping(&self) -> Result<(), AppError>;
}
