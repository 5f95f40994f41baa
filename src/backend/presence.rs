/**
 * Presence Tracker
 *
 * Process-wide registry of connected users, independent of any single
 * document session, plus a per-document active-user view kept in step with
 * the session participant sets.
 *
 * The registry is an explicitly constructed object with an explicit
 * lifecycle: created once at process start, passed by reference to the
 * components that need it, torn down with the engine. There is no ambient
 * global state.
 *
 * Online/offline transitions are published over a `tokio::sync::broadcast`
 * channel; the engine fans them out to every live connection. Entries are
 * created on transport connect and removed on disconnect; no heartbeat
 * beyond the transport's own liveness signaling is required.
 */
use crate::backend::session::SessionKey;
use crate::backend::transport::ConnectionId;
use crate::shared::event::ServerEvent;
use crate::shared::user::UserIdentity;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Broadcast channel carrying presence transitions
pub type PresenceBroadcast = broadcast::Sender<ServerEvent>;

/// Process-wide presence registry
#[derive(Debug, Clone)]
pub struct PresenceRegistry {
    /// Online users keyed by connection identity
    online: Arc<RwLock<HashMap<ConnectionId, UserIdentity>>>,
    /// Active user ids per document session
    by_document: Arc<RwLock<HashMap<SessionKey, HashSet<Uuid>>>>,
    events: PresenceBroadcast,
}

impl PresenceRegistry {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            online: Arc::new(RwLock::new(HashMap::new())),
            by_document: Arc::new(RwLock::new(HashMap::new())),
            events,
        }
    }

    /// Subscribe to presence transitions
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    /// Record a connection coming online
    ///
    /// A user with several live connections appears online once; only the
    /// first connection publishes a `user-online` event.
    pub async fn user_online(&self, connection: ConnectionId, user: UserIdentity) {
        let mut online = self.online.write().await;
        let already_online = online.values().any(|u| u.id == user.id);
        online.insert(connection, user.clone());
        drop(online);

        if !already_online {
            tracing::debug!(user = %user.username, "user online");
            let _ = self.events.send(ServerEvent::UserOnline { user });
        }
    }

    /// Record a connection going away; publishes `user-offline` when it was
    /// the user's last connection
    pub async fn user_offline(&self, connection: ConnectionId) -> Option<Uuid> {
        let mut online = self.online.write().await;
        let user = online.remove(&connection)?;
        let still_online = online.values().any(|u| u.id == user.id);
        drop(online);

        if still_online {
            return None;
        }
        tracing::debug!(user = %user.username, "user offline");
        let _ = self.events.send(ServerEvent::UserOffline { user_id: user.id });
        Some(user.id)
    }

    /// The full online set, one entry per user
    pub async fn online_users(&self) -> Vec<UserIdentity> {
        let online = self.online.read().await;
        let mut seen = HashSet::new();
        online
            .values()
            .filter(|u| seen.insert(u.id))
            .cloned()
            .collect()
    }

    /// Record that a user became active in a document session
    pub async fn joined_document(&self, key: &SessionKey, user_id: Uuid) {
        let mut docs = self.by_document.write().await;
        docs.entry(key.clone()).or_default().insert(user_id);
    }

    /// Record that a user left a document session
    pub async fn left_document(&self, key: &SessionKey, user_id: Uuid) {
        let mut docs = self.by_document.write().await;
        if let Some(users) = docs.get_mut(key) {
            users.remove(&user_id);
            if users.is_empty() {
                docs.remove(key);
            }
        }
    }

    /// Active user ids for one document
    pub async fn document_users(&self, key: &SessionKey) -> HashSet<Uuid> {
        let docs = self.by_document.read().await;
        docs.get(key).cloned().unwrap_or_default()
    }
}
