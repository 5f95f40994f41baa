/**
 * Session Manager
 *
 * Owns the lifecycle of every live collaborative session. Sessions are
 * created lazily on first join, addressed by (document-type, document-id),
 * and swept out of the registry once their actor has terminated.
 *
 * The manager never touches document content itself; it only spawns and
 * routes to the per-document actors that do.
 */
use crate::backend::presence::PresenceRegistry;
use crate::backend::session::actor::{self, JoinSnapshot, SessionHandle};
use crate::backend::session::state::SessionKey;
use crate::backend::transport::ClientHandle;
use crate::shared::config::EngineConfig;
use crate::shared::error::EngineError;
use crate::shared::user::UserIdentity;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registry of live session actors
#[derive(Debug, Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<SessionKey, SessionHandle>>>,
    config: Arc<EngineConfig>,
    presence: PresenceRegistry,
}

impl SessionManager {
    pub fn new(config: Arc<EngineConfig>, presence: PresenceRegistry) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config,
            presence,
        }
    }

    /// Get the live handle for a session, spawning the actor if the
    /// session does not exist yet (or its previous actor terminated)
    pub async fn session(&self, key: &SessionKey) -> SessionHandle {
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(key) {
                if !handle.is_closed() {
                    return handle.clone();
                }
            }
        }

        let mut sessions = self.sessions.write().await;
        // Re-check under the write lock: another task may have spawned it.
        if let Some(handle) = sessions.get(key) {
            if !handle.is_closed() {
                return handle.clone();
            }
        }
        let handle = actor::spawn(key.clone(), self.config.clone(), self.presence.clone());
        sessions.insert(key.clone(), handle.clone());
        tracing::info!(session = %key, "session created");
        handle
    }

    /// Get the handle for an existing live session, without creating one
    pub async fn get(&self, key: &SessionKey) -> Result<SessionHandle, EngineError> {
        let sessions = self.sessions.read().await;
        match sessions.get(key) {
            Some(handle) if !handle.is_closed() => Ok(handle.clone()),
            _ => Err(EngineError::SessionNotFound {
                document_type: key.document_type.clone(),
                document_id: key.document_id.clone(),
            }),
        }
    }

    /// Join a session, lazily creating it, and return the snapshot
    pub async fn join_session(
        &self,
        key: &SessionKey,
        user: UserIdentity,
        handle: ClientHandle,
    ) -> Result<JoinSnapshot, EngineError> {
        let session = self.session(key).await;
        match session.join(user.clone(), handle.clone()).await {
            Ok(snapshot) => Ok(snapshot),
            // The actor can terminate between lookup and join; retry once
            // against a fresh one.
            Err(EngineError::SessionClosed) => {
                let session = self.session(key).await;
                session.join(user, handle).await
            }
            Err(e) => Err(e),
        }
    }

    /// Number of registered sessions, live or awaiting sweep
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop registry entries whose actors have terminated
    pub async fn sweep(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| !handle.is_closed());
        before - sessions.len()
    }

    /// Start the periodic sweep task
    pub fn spawn_sweeper(&self) {
        let manager = self.clone();
        let period = std::time::Duration::from_secs(manager.config.session_sweep_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let removed = manager.sweep().await;
                if removed > 0 {
                    tracing::debug!("swept {} terminated sessions", removed);
                }
            }
        });
    }
}
