/**
 * Session State
 *
 * The state owned by one session actor: the ordered participant set, the
 * per-participant transport handles, the lock, and the document core
 * (content + operation log). Nothing outside the actor ever holds a
 * reference to this; all access is serialized through the actor's inbox.
 */
use crate::backend::lock::LockState;
use crate::backend::oplog::DocumentCore;
use crate::backend::transport::ClientHandle;
use crate::shared::event::ServerEvent;
use crate::shared::user::{SessionParticipant, UserIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Identifies one collaborative session: a (document-type, document-id) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub document_type: String,
    pub document_id: String,
}

impl SessionKey {
    pub fn new(document_type: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            document_type: document_type.into(),
            document_id: document_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.document_type, self.document_id)
    }
}

/// In-actor state for one collaborative session
#[derive(Debug)]
pub struct SessionState {
    key: SessionKey,
    /// Participants in join order
    participants: Vec<SessionParticipant>,
    /// Transport handle per participant
    handles: HashMap<Uuid, ClientHandle>,
    pub lock: LockState,
    pub core: DocumentCore,
    pub last_activity: DateTime<Utc>,
}

impl SessionState {
    pub fn new(key: SessionKey) -> Self {
        let core = DocumentCore::new(key.document_type.clone(), key.document_id.clone());
        Self {
            key,
            participants: Vec::new(),
            handles: HashMap::new(),
            lock: LockState::new(),
            core,
            last_activity: Utc::now(),
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn participants(&self) -> &[SessionParticipant] {
        &self.participants
    }

    pub fn participant_mut(&mut self, user_id: Uuid) -> Option<&mut SessionParticipant> {
        self.participants.iter_mut().find(|p| p.user_id == user_id)
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Register a joining participant; idempotent per user
    ///
    /// Rejoining refreshes the transport handle (a reconnect replaces the
    /// dead one) and the last-seen timestamp without duplicating the
    /// participant entry. Returns whether the user was newly added.
    pub fn join(&mut self, user: &UserIdentity, handle: ClientHandle) -> bool {
        self.touch();
        self.handles.insert(user.id, handle);
        if let Some(existing) = self.participant_mut(user.id) {
            existing.last_seen = Utc::now();
            return false;
        }
        self.participants.push(SessionParticipant::new(user));
        self.core.state_mut().active_users.push(user.id);
        true
    }

    /// Remove a participant; returns the removed record
    pub fn leave(&mut self, user_id: Uuid) -> Option<SessionParticipant> {
        self.touch();
        self.handles.remove(&user_id);
        let idx = self.participants.iter().position(|p| p.user_id == user_id)?;
        let removed = self.participants.remove(idx);
        self.core.state_mut().active_users.retain(|id| *id != user_id);
        Some(removed)
    }

    /// Send an event to every participant, optionally skipping one
    ///
    /// The skip is how the originator of an operation receives an
    /// acknowledgment instead of an echo of its own edit.
    pub fn broadcast(&self, event: &ServerEvent, except: Option<Uuid>) {
        for (user_id, handle) in &self.handles {
            if Some(*user_id) == except {
                continue;
            }
            handle.send(event.clone());
        }
    }

    /// Send an event to one participant
    pub fn send_to(&self, user_id: Uuid, event: ServerEvent) {
        if let Some(handle) = self.handles.get(&user_id) {
            handle.send(event);
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SessionState {
        SessionState::new(SessionKey::new("quote", "Q-1"))
    }

    fn connect(name: &str) -> (UserIdentity, ClientHandle) {
        let user = UserIdentity::new(Uuid::new_v4(), name);
        let (handle, _rx) = ClientHandle::new(user.clone());
        (user, handle)
    }

    #[test]
    fn test_join_is_idempotent() {
        let mut state = state();
        let (alice, handle) = connect("alice");
        assert!(state.join(&alice, handle.clone()));
        assert!(!state.join(&alice, handle));
        assert_eq!(state.participants().len(), 1);
        assert_eq!(state.core.state().active_users.len(), 1);
    }

    #[test]
    fn test_join_order_is_preserved() {
        let mut state = state();
        let (alice, ah) = connect("alice");
        let (bob, bh) = connect("bob");
        state.join(&alice, ah);
        state.join(&bob, bh);
        let names: Vec<&str> = state.participants().iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[test]
    fn test_leave_removes_participant_and_active_user() {
        let mut state = state();
        let (alice, handle) = connect("alice");
        state.join(&alice, handle);
        let removed = state.leave(alice.id).unwrap();
        assert_eq!(removed.user_id, alice.id);
        assert!(state.is_empty());
        assert!(state.core.state().active_users.is_empty());
        assert!(state.leave(alice.id).is_none());
    }

    #[tokio::test]
    async fn test_broadcast_skips_excepted_user() {
        let mut state = state();
        let alice_user = UserIdentity::new(Uuid::new_v4(), "alice");
        let bob_user = UserIdentity::new(Uuid::new_v4(), "bob");
        let (alice_handle, mut alice_rx) = ClientHandle::new(alice_user.clone());
        let (bob_handle, mut bob_rx) = ClientHandle::new(bob_user.clone());
        state.join(&alice_user, alice_handle);
        state.join(&bob_user, bob_handle);

        let event = ServerEvent::DocumentUnlocked {
            document_type: "quote".to_string(),
            document_id: "Q-1".to_string(),
        };
        state.broadcast(&event, Some(alice_user.id));

        assert!(bob_rx.recv().await.is_some());
        assert!(alice_rx.try_recv().is_err());
    }
}
