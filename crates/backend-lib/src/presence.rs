// ============================
// crates/backend-lib/src/presence.rs
// ============================
//! Presence channel: user-global availability signals and keepalive.
//! Presence is not scoped to rooms; announcements reach every other
//! connection on the service.

use crate::broker::Scope;
use crate::connection::{now_ms, ConnectionHandler};
use crate::error::AppError;
use crate::store::SessionStore;
use classroom_common::ServerEvent;

impl<S: SessionStore> ConnectionHandler<S> {
    pub(crate) async fn handle_online(&self) -> Result<(), AppError> {
        let identity = self.identity()?.clone();
        self.state
            .store
            .set_active_user(&identity.user_id, &self.conn_id.to_string())
            .await?;
        self.publish(
            Scope::AllExcept {
                conn_id: self.conn_id,
            },
            &ServerEvent::UserOnline {
                user_id: identity.user_id,
                user_name: identity.user_name,
                timestamp: now_ms(),
            },
        )
        .await
    }

    pub(crate) async fn handle_offline(&self) -> Result<(), AppError> {
        let identity = self.identity()?.clone();
        self.state.store.remove_active_user(&identity.user_id).await?;
        self.publish(
            Scope::AllExcept {
                conn_id: self.conn_id,
            },
            &ServerEvent::UserOffline {
                user_id: identity.user_id,
                timestamp: now_ms(),
            },
        )
        .await
    }

    /// Away keeps the active-user entry; the user is reachable, just idle.
    pub(crate) async fn handle_away(&self) -> Result<(), AppError> {
        let identity = self.identity()?.clone();
        self.publish(
            Scope::AllExcept {
                conn_id: self.conn_id,
            },
            &ServerEvent::UserAway {
                user_id: identity.user_id,
                timestamp: now_ms(),
            },
        )
        .await
    }

    pub(crate) async fn handle_ping(&self) -> Result<(), AppError> {
        self.identity()?;
        self.send(ServerEvent::Pong {
            timestamp: now_ms(),
        })
        .await
    }
}
