// ============================
// crates/backend-lib/src/store/redis.rs
// ============================
//! Redis-backed `SessionStore`.
//!
//! Key patterns:
//!
//! ```text
//! room:{id}:participants      → hash of user id → display name
//! room:{id}:whiteboard        → snapshot string, TTL-bound
//! room:{id}:messages          → monotonic message counter
//! ratelimit:{user}:{event}    → windowed event counter, TTL-bound
//! active-users                → hash of user id → connection id
//! ```

use super::SessionStore;
use crate::error::AppError;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::collections::HashMap;
use std::time::Duration;

fn participants_key(room_id: &str) -> String {
    format!("room:{room_id}:participants")
}

fn whiteboard_key(room_id: &str) -> String {
    format!("room:{room_id}:whiteboard")
}

fn messages_key(room_id: &str) -> String {
    format!("room:{room_id}:messages")
}

fn rate_key(user_id: &str, event: &str) -> String {
    format!("ratelimit:{user_id}:{event}")
}

const ACTIVE_USERS_KEY: &str = "active-users";

/// Redis implementation over a multiplexed connection manager; reconnects
/// transparently, so per-operation errors surface only while the backend is
/// actually unreachable.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to the given Redis URL.
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn add_participant(
        &self,
        room_id: &str,
        user_id: &str,
        user_name: &str,
    ) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .hset(participants_key(room_id), user_id, user_name)
            .await?;
        Ok(())
    }

    async fn remove_participant(&self, room_id: &str, user_id: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hdel(participants_key(room_id), user_id).await?;
        Ok(())
    }

    async fn participants(&self, room_id: &str) -> Result<HashMap<String, String>, AppError> {
        let mut conn = self.conn.clone();
        let members: HashMap<String, String> = conn.hgetall(participants_key(room_id)).await?;
        Ok(members)
    }

    async fn save_whiteboard(
        &self,
        room_id: &str,
        snapshot: &str,
        ttl: Duration,
    ) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(whiteboard_key(room_id), snapshot, ttl.as_secs())
            .await?;
        Ok(())
    }

    async fn load_whiteboard(&self, room_id: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        let snapshot: Option<String> = conn.get(whiteboard_key(room_id)).await?;
        Ok(snapshot)
    }

    async fn clear_whiteboard(&self, room_id: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(whiteboard_key(room_id)).await?;
        Ok(())
    }

    async fn next_message_seq(&self, room_id: &str) -> Result<u64, AppError> {
        let mut conn = self.conn.clone();
        let seq: u64 = conn.incr(messages_key(room_id), 1u64).await?;
        Ok(seq)
    }

    async fn message_count(&self, room_id: &str) -> Result<u64, AppError> {
        let mut conn = self.conn.clone();
        let count: Option<u64> = conn.get(messages_key(room_id)).await?;
        Ok(count.unwrap_or(0))
    }

    async fn incr_event_count(
        &self,
        user_id: &str,
        event: &str,
        window: Duration,
    ) -> Result<u64, AppError> {
        let key = rate_key(user_id, event);
        let mut conn = self.conn.clone();
        // INCR + EXPIRE NX in one transaction: the expiry is attached in
        // the same atomic step that creates the counter, so no interleaving
        // can leave a counter without a window.
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(&key)
            .cmd("EXPIRE")
            .arg(&key)
            .arg(window.as_secs())
            .arg("NX")
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn set_active_user(&self, user_id: &str, conn_id: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(ACTIVE_USERS_KEY, user_id, conn_id).await?;
        Ok(())
    }

    async fn remove_active_user(&self, user_id: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hdel(ACTIVE_USERS_KEY, user_id).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(AppError::Store(format!("unexpected PING reply: {pong}")))
        }
    }
}
