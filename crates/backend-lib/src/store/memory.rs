// ============================
// crates/backend-lib/src/store/memory.rs
// ============================
//! In-memory `SessionStore` used by tests and single-node development.

use super::SessionStore;
use crate::error::AppError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// In-memory fake backed by `DashMap`. Atomicity comes from the entry API:
/// each trait method touches a key exactly once while holding its shard
/// lock, mirroring the single-command semantics of the Redis backend.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    /// room id -> (user id -> display name)
    participants: DashMap<String, HashMap<String, String>>,
    /// room id -> (snapshot, expires at)
    whiteboards: DashMap<String, (String, Instant)>,
    /// room id -> message counter
    counters: DashMap<String, u64>,
    /// "user:event" -> (count, window ends at)
    rate: DashMap<String, (u64, Instant)>,
    /// user id -> connection id
    active: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn add_participant(
        &self,
        room_id: &str,
        user_id: &str,
        user_name: &str,
    ) -> Result<(), AppError> {
        self.inner
            .participants
            .entry(room_id.to_string())
            .or_default()
            .insert(user_id.to_string(), user_name.to_string());
        Ok(())
    }

    async fn remove_participant(&self, room_id: &str, user_id: &str) -> Result<(), AppError> {
        if let Some(mut members) = self.inner.participants.get_mut(room_id) {
            members.remove(user_id);
        }
        Ok(())
    }

    async fn participants(&self, room_id: &str) -> Result<HashMap<String, String>, AppError> {
        Ok(self
            .inner
            .participants
            .get(room_id)
            .map(|members| members.clone())
            .unwrap_or_default())
    }

    async fn save_whiteboard(
        &self,
        room_id: &str,
        snapshot: &str,
        ttl: Duration,
    ) -> Result<(), AppError> {
        self.inner
            .whiteboards
            .insert(room_id.to_string(), (snapshot.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn load_whiteboard(&self, room_id: &str) -> Result<Option<String>, AppError> {
        let expired = match self.inner.whiteboards.get(room_id) {
            Some(entry) => {
                if Instant::now() < entry.1 {
                    return Ok(Some(entry.0.clone()));
                }
                true
            },
            None => false,
        };
        if expired {
            self.inner.whiteboards.remove(room_id);
        }
        Ok(None)
    }

    async fn clear_whiteboard(&self, room_id: &str) -> Result<(), AppError> {
        self.inner.whiteboards.remove(room_id);
        Ok(())
    }

    async fn next_message_seq(&self, room_id: &str) -> Result<u64, AppError> {
        let mut counter = self.inner.counters.entry(room_id.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn message_count(&self, room_id: &str) -> Result<u64, AppError> {
        Ok(self.inner.counters.get(room_id).map_or(0, |c| *c))
    }

    async fn incr_event_count(
        &self,
        user_id: &str,
        event: &str,
        window: Duration,
    ) -> Result<u64, AppError> {
        let key = format!("{user_id}:{event}");
        let now = Instant::now();
        let mut entry = self
            .inner
            .rate
            .entry(key)
            .or_insert_with(|| (0, now + window));
        if now >= entry.1 {
            *entry = (0, now + window);
        }
        entry.0 += 1;
        Ok(entry.0)
    }

    async fn set_active_user(&self, user_id: &str, conn_id: &str) -> Result<(), AppError> {
        self.inner
            .active
            .insert(user_id.to_string(), conn_id.to_string());
        Ok(())
    }

    async fn remove_active_user(&self, user_id: &str) -> Result<(), AppError> {
        self.inner.active.remove(user_id);
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_participant_last_join_wins() {
        let store = MemoryStore::new();
        store.add_participant("room-1", "u1", "Ada").await.unwrap();
        store.add_participant("room-1", "u2", "Grace").await.unwrap();
        store.add_participant("room-1", "u1", "Ada L.").await.unwrap();

        let members = store.participants("room-1").await.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members["u1"], "Ada L.");

        store.remove_participant("room-1", "u1").await.unwrap();
        let members = store.participants("room-1").await.unwrap();
        assert!(!members.contains_key("u1"));
        assert!(members.contains_key("u2"));
    }

    #[tokio::test]
    async fn test_whiteboard_save_load_clear() {
        let store = MemoryStore::new();
        assert_eq!(store.load_whiteboard("room-1").await.unwrap(), None);

        store
            .save_whiteboard("room-1", r#"{"shapes":[]}"#, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            store.load_whiteboard("room-1").await.unwrap().as_deref(),
            Some(r#"{"shapes":[]}"#)
        );

        store.clear_whiteboard("room-1").await.unwrap();
        assert_eq!(store.load_whiteboard("room-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_whiteboard_expires() {
        let store = MemoryStore::new();
        store
            .save_whiteboard("room-1", "snap", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.load_whiteboard("room-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_message_counter_is_monotonic() {
        let store = MemoryStore::new();
        assert_eq!(store.message_count("room-1").await.unwrap(), 0);
        assert_eq!(store.next_message_seq("room-1").await.unwrap(), 1);
        assert_eq!(store.next_message_seq("room-1").await.unwrap(), 2);
        assert_eq!(store.message_count("room-1").await.unwrap(), 2);
        // independent per room
        assert_eq!(store.next_message_seq("room-2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rate_counter_window_reset() {
        let store = MemoryStore::new();
        let window = Duration::from_millis(20);
        assert_eq!(
            store.incr_event_count("u1", "chat-message", window).await.unwrap(),
            1
        );
        assert_eq!(
            store.incr_event_count("u1", "chat-message", window).await.unwrap(),
            2
        );
        // separate event name, separate counter
        assert_eq!(
            store
                .incr_event_count("u1", "whiteboard-draw", window)
                .await
                .unwrap(),
            1
        );

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(
            store.incr_event_count("u1", "chat-message", window).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_active_user_directory() {
        let store = MemoryStore::new();
        store.set_active_user("u1", "conn-a").await.unwrap();
        store.set_active_user("u1", "conn-b").await.unwrap();
        store.remove_active_user("u1").await.unwrap();
        // removal is idempotent
        store.remove_active_user("u1").await.unwrap();
    }
}
