// ============================
// crates/backend-lib/src/rate_limit.rs
// ============================
//! Per-user per-event rate limiting built atop the session store.

use crate::error::AppError;
use crate::store::SessionStore;
use metrics::counter;
use std::time::Duration;
use tracing::warn;

/// Fixed-window event ceiling. Counters live in the session store so the
/// limit holds across horizontally-scaled processes; each event name gets
/// its own counter, so chat and whiteboard floods do not interact.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    window: Duration,
    max_events: u64,
}

impl RateLimiter {
    pub fn new(window: Duration, max_events: u64) -> Self {
        Self { window, max_events }
    }

    /// Count one occurrence of `event` for `user_id` and report whether it
    /// is still within the ceiling. The store increment starts the window
    /// atomically when the counter is created.
    pub async fn check<S: SessionStore>(
        &self,
        store: &S,
        user_id: &str,
        event: &str,
    ) -> Result<bool, AppError> {
        let count = store.incr_event_count(user_id, event, self.window).await?;
        if count > self.max_events {
            warn!(user_id, event, count, "rate limit exceeded");
            counter!(crate::metrics::RATE_LIMITED).increment(1);
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_ceiling_rejects_next_event() {
        let store = MemoryStore::new();
        let limiter = RateLimiter::new(Duration::from_secs(60), 3);

        for _ in 0..3 {
            assert!(limiter.check(&store, "u1", "chat-message").await.unwrap());
        }
        assert!(!limiter.check(&store, "u1", "chat-message").await.unwrap());
    }

    #[tokio::test]
    async fn test_events_are_independent() {
        let store = MemoryStore::new();
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);

        assert!(limiter.check(&store, "u1", "chat-message").await.unwrap());
        assert!(!limiter.check(&store, "u1", "chat-message").await.unwrap());
        // a different event name still has headroom
        assert!(limiter.check(&store, "u1", "whiteboard-draw").await.unwrap());
        // as does a different user
        assert!(limiter.check(&store, "u2", "chat-message").await.unwrap());
    }

    #[tokio::test]
    async fn test_window_reset_allows_sending_again() {
        let store = MemoryStore::new();
        let limiter = RateLimiter::new(Duration::from_millis(20), 1);

        assert!(limiter.check(&store, "u1", "chat-message").await.unwrap());
        assert!(!limiter.check(&store, "u1", "chat-message").await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.check(&store, "u1", "chat-message").await.unwrap());
    }
}
