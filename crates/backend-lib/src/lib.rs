// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core library for the classroom real-time collaboration server.

pub mod broker;
pub mod chat;
pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod metrics;
pub mod presence;
pub mod rate_limit;
pub mod registry;
pub mod room;
pub mod store;
pub mod validation;
pub mod whiteboard;
pub mod ws_router;

use crate::broker::{Broker, LocalBroker};
use crate::config::Settings;
use crate::rate_limit::RateLimiter;
use crate::registry::Registry;
use crate::store::SessionStore;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application state shared across all connections and HTTP handlers
pub struct AppState<S> {
    /// Settings manager
    pub settings: Arc<Settings>,
    /// Session store backend
    pub store: S,
    /// Live connection registry for this process
    pub registry: Arc<Registry>,
    /// Fan-out layer for broadcasts
    pub broker: Arc<dyn Broker>,
    /// Per-user per-event rate limiter
    pub rate_limiter: RateLimiter,
    /// Process start, reported by `/metrics`
    pub started_at: Instant,
}

impl<S: SessionStore> AppState<S> {
    /// Create application state with an explicit registry and broker.
    pub fn new(
        store: S,
        registry: Arc<Registry>,
        broker: Arc<dyn Broker>,
        settings: Settings,
    ) -> Self {
        let rate_limiter = RateLimiter::new(
            Duration::from_secs(settings.rate_limit.window_secs),
            settings.rate_limit.max_events,
        );
        Self {
            settings: Arc::new(settings),
            store,
            registry,
            broker,
            rate_limiter,
            started_at: Instant::now(),
        }
    }

    /// Create application state wired for a single process: a fresh
    /// registry and a [`LocalBroker`] over it.
    pub fn new_local(store: S, settings: Settings) -> Self {
        let registry = Arc::new(Registry::new());
        let broker = Arc::new(LocalBroker::new(registry.clone()));
        Self::new(store, registry, broker, settings)
    }

    /// Configured whiteboard snapshot TTL.
    pub fn whiteboard_ttl(&self) -> Duration {
        Duration::from_secs(self.settings.whiteboard_ttl_secs)
    }
}
