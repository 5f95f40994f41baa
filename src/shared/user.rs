/**
 * User Identity and Session Participants
 *
 * This module defines the identity attached to a connection at connect time
 * and the per-session participant records derived from it. Identity is
 * issued by an external authentication layer; the engine only carries it.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated identity attached to a transport connection
///
/// Issued by the surrounding system's auth layer when the connection is
/// opened. The engine treats it as opaque and trusted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIdentity {
    /// Stable user id
    pub id: Uuid,
    /// Display name
    pub username: String,
    /// Optional avatar reference (URL or asset key)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl UserIdentity {
    pub fn new(id: Uuid, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            avatar: None,
        }
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

/// What a participant is currently doing in a session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    /// Reading the document
    Viewing,
    /// Actively editing
    Editing,
}

/// A participant's cursor position within the document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CursorPosition {
    /// Field the cursor is in
    pub field: String,
    /// Character offset within the field's text
    pub offset: usize,
}

/// A user's presence within one collaborative session
///
/// Created on join, updated on status/cursor change, removed on leave or
/// disconnect. A user appears at most once per document's participant set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionParticipant {
    pub user_id: Uuid,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub status: ParticipantStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorPosition>,
    pub last_seen: DateTime<Utc>,
}

impl SessionParticipant {
    /// Create a participant record for a joining user, initially viewing
    pub fn new(user: &UserIdentity) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            avatar: user.avatar.clone(),
            status: ParticipantStatus::Viewing,
            cursor: None,
            last_seen: Utc::now(),
        }
    }

    /// Apply a presence delta, refreshing the last-seen timestamp
    pub fn apply(&mut self, change: &StatusChange) {
        if let Some(status) = change.status {
            self.status = status;
        }
        if let Some(cursor) = &change.cursor {
            self.cursor = Some(cursor.clone());
        }
        self.last_seen = Utc::now();
    }
}

/// Presence delta rebroadcast to the other participants
///
/// Only the changed pieces travel over the wire, never a full participant
/// snapshot. This bounds bandwidth under N-way editing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StatusChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ParticipantStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorPosition>,
}

impl StatusChange {
    pub fn status(status: ParticipantStatus) -> Self {
        Self {
            status: Some(status),
            cursor: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.cursor.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_starts_viewing() {
        let user = UserIdentity::new(Uuid::new_v4(), "alice");
        let participant = SessionParticipant::new(&user);
        assert_eq!(participant.status, ParticipantStatus::Viewing);
        assert!(participant.cursor.is_none());
        assert_eq!(participant.username, "alice");
    }

    #[test]
    fn test_apply_status_change() {
        let user = UserIdentity::new(Uuid::new_v4(), "alice");
        let mut participant = SessionParticipant::new(&user);

        let change = StatusChange {
            status: Some(ParticipantStatus::Editing),
            cursor: Some(CursorPosition {
                field: "title".to_string(),
                offset: 3,
            }),
        };
        participant.apply(&change);

        assert_eq!(participant.status, ParticipantStatus::Editing);
        assert_eq!(participant.cursor.as_ref().unwrap().offset, 3);
    }

    #[test]
    fn test_partial_change_keeps_cursor() {
        let user = UserIdentity::new(Uuid::new_v4(), "alice");
        let mut participant = SessionParticipant::new(&user);
        participant.cursor = Some(CursorPosition {
            field: "body".to_string(),
            offset: 10,
        });

        participant.apply(&StatusChange::status(ParticipantStatus::Editing));
        assert_eq!(participant.cursor.as_ref().unwrap().field, "body");
    }

    #[test]
    fn test_status_change_serialization_omits_empty() {
        let change = StatusChange::status(ParticipantStatus::Editing);
        let json = serde_json::to_string(&change).unwrap();
        assert!(json.contains("editing"));
        assert!(!json.contains("cursor"));
    }
}
