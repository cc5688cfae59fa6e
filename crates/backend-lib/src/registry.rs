// ============================
// crates/backend-lib/src/registry.rs
// ============================
//! Live connection registry.
//!
//! In-process view of the transport layer: per-connection outbound senders,
//! bound identities, transport-level room membership and the user-id
//! private channels. Cross-process state lives in the session store; the
//! registry only knows about connections this process holds.

use crate::broker::Scope;
use classroom_common::{Identity, Participant, ServerEvent};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

struct ConnEntry {
    tx: mpsc::Sender<ServerEvent>,
    identity: Option<Identity>,
}

/// Registry of the connections held by this process.
#[derive(Default)]
pub struct Registry {
    conns: DashMap<Uuid, ConnEntry>,
    rooms: DashMap<String, HashSet<Uuid>>,
    /// user id -> connection id, the implicit private channel
    users: DashMap<String, Uuid>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly-upgraded connection's outbound channel.
    pub fn register(&self, conn_id: Uuid, tx: mpsc::Sender<ServerEvent>) {
        self.conns.insert(conn_id, ConnEntry { tx, identity: None });
    }

    /// Drop a connection and its user private channel.
    pub fn unregister(&self, conn_id: Uuid) {
        if let Some((_, entry)) = self.conns.remove(&conn_id) {
            if let Some(identity) = entry.identity {
                self.users
                    .remove_if(&identity.user_id, |_, bound| *bound == conn_id);
            }
        }
        debug!(%conn_id, "connection unregistered");
    }

    /// Bind an authenticated identity to a connection and open its user
    /// private channel. Later bindings for the same user id win.
    pub fn bind_identity(&self, conn_id: Uuid, identity: &Identity) {
        if let Some(mut entry) = self.conns.get_mut(&conn_id) {
            entry.identity = Some(identity.clone());
        }
        self.users.insert(identity.user_id.clone(), conn_id);
    }

    /// Add a connection to a room's transport-level broadcast group.
    pub fn join_room(&self, room_id: &str, conn_id: Uuid) {
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(conn_id);
    }

    /// Remove a connection from a room's broadcast group.
    pub fn leave_room(&self, room_id: &str, conn_id: Uuid) {
        if let Some(mut members) = self.rooms.get_mut(room_id) {
            members.remove(&conn_id);
        }
        self.rooms.remove_if(room_id, |_, members| members.is_empty());
    }

    /// Participant list derived from live connections rather than the
    /// stored set, deduped by user id. The store can accumulate stale
    /// entries after an uncleanly-recorded disconnect; the transport view
    /// is self-healing.
    pub fn live_participants(&self, room_id: &str) -> Vec<Participant> {
        let conn_ids: Vec<Uuid> = match self.rooms.get(room_id) {
            Some(members) => members.iter().copied().collect(),
            None => return Vec::new(),
        };

        let mut by_user: HashMap<String, String> = HashMap::new();
        for conn_id in conn_ids {
            if let Some(entry) = self.conns.get(&conn_id) {
                if let Some(identity) = &entry.identity {
                    by_user.insert(identity.user_id.clone(), identity.user_name.clone());
                }
            }
        }

        by_user
            .into_iter()
            .map(|(user_id, user_name)| Participant { user_id, user_name })
            .collect()
    }

    /// Number of live connections in a room.
    pub fn room_size(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |members| members.len())
    }

    /// Total live connections held by this process.
    pub fn connection_count(&self) -> usize {
        self.conns.len()
    }

    /// Deliver an event to every local connection the scope selects.
    /// Senders are collected before awaiting so no map shard lock is held
    /// across a suspension point.
    pub async fn deliver(&self, scope: &Scope, event: &ServerEvent) {
        let targets: Vec<mpsc::Sender<ServerEvent>> = match scope {
            Scope::Room { room_id } => self.room_senders(room_id, None),
            Scope::RoomExcept { room_id, conn_id } => self.room_senders(room_id, Some(*conn_id)),
            Scope::AllExcept { conn_id } => self
                .conns
                .iter()
                .filter(|entry| *entry.key() != *conn_id)
                .map(|entry| entry.tx.clone())
                .collect(),
            Scope::User { user_id } => self
                .users
                .get(user_id)
                .and_then(|conn_id| self.conns.get(&conn_id))
                .map(|entry| vec![entry.tx.clone()])
                .unwrap_or_default(),
        };

        let mut failed = 0usize;
        for tx in targets {
            if tx.send(event.clone()).await.is_err() {
                failed += 1;
            }
        }
        if failed > 0 {
            debug!(failed, "some connections missed a delivery");
        }
    }

    fn room_senders(&self, room_id: &str, except: Option<Uuid>) -> Vec<mpsc::Sender<ServerEvent>> {
        let Some(members) = self.rooms.get(room_id) else {
            return Vec::new();
        };
        members
            .iter()
            .filter(|conn_id| except != Some(**conn_id))
            .filter_map(|conn_id| self.conns.get(conn_id))
            .map(|entry| entry.tx.clone())
            .collect()
    }
}
