// ============================
// crates/backend-lib/src/broker.rs
// ============================
//! Pub/sub fan-out layer.
//!
//! Broadcasts go through a [`Broker`] so the service can run as several
//! processes sharing one logical session store: [`LocalBroker`] delivers to
//! this process only, [`RedisBroker`] additionally relays every publish
//! over a Redis pub/sub channel to the peer processes. Without the relay,
//! a horizontally-scaled deployment silently loses cross-process messages.

use crate::error::AppError;
use crate::registry::Registry;
use async_trait::async_trait;
use classroom_common::ServerEvent;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Which connections a broadcast addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "kebab-case")]
pub enum Scope {
    /// Every member of a room, sender included.
    Room { room_id: String },
    /// Every member of a room except one connection.
    RoomExcept { room_id: String, conn_id: Uuid },
    /// Every connection except one (user-global presence).
    AllExcept { conn_id: Uuid },
    /// The private channel of one user.
    User { user_id: String },
}

/// Fan-out abstraction shared by all channel handlers.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, scope: Scope, event: &ServerEvent) -> Result<(), AppError>;
}

/// Single-process broker: local registry delivery only.
pub struct LocalBroker {
    registry: Arc<Registry>,
}

impl LocalBroker {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Broker for LocalBroker {
    async fn publish(&self, scope: Scope, event: &ServerEvent) -> Result<(), AppError> {
        self.registry.deliver(&scope, event).await;
        Ok(())
    }
}

/// Message relayed between processes.
#[derive(Serialize, Deserialize)]
struct Envelope {
    origin: Uuid,
    scope: Scope,
    event: ServerEvent,
}

/// Redis pub/sub broker: delivers locally, then relays the envelope to
/// every peer process. Envelopes carry the publishing process's origin id
/// so the subscriber task can skip its own messages.
pub struct RedisBroker {
    registry: Arc<Registry>,
    conn: ConnectionManager,
    channel: String,
    origin: Uuid,
}

impl RedisBroker {
    /// Connect to Redis, subscribe to the fan-out channel and spawn the
    /// subscriber task that feeds remote envelopes into the local registry.
    pub async fn connect(
        url: &str,
        channel: &str,
        registry: Arc<Registry>,
    ) -> Result<Self, AppError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client.clone()).await?;
        let origin = Uuid::new_v4();

        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;

        let subscriber_registry = registry.clone();
        tokio::spawn(async move {
            let mut messages = pubsub.on_message();
            while let Some(msg) = messages.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(%err, "unreadable fan-out payload");
                        continue;
                    },
                };
                match serde_json::from_str::<Envelope>(&payload) {
                    Ok(envelope) if envelope.origin != origin => {
                        subscriber_registry
                            .deliver(&envelope.scope, &envelope.event)
                            .await;
                    },
                    Ok(_) => debug!("skipping own fan-out envelope"),
                    Err(err) => warn!(%err, "malformed fan-out envelope"),
                }
            }
        });

        Ok(Self {
            registry,
            conn,
            channel: channel.to_string(),
            origin,
        })
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn publish(&self, scope: Scope, event: &ServerEvent) -> Result<(), AppError> {
        self.registry.deliver(&scope, event).await;

        let envelope = Envelope {
            origin: self.origin,
            scope,
            event: event.clone(),
        };
        let payload = serde_json::to_string(&envelope)?;
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("PUBLISH")
            .arg(&self.channel)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}
