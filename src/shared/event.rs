/**
 * Client/Server Event Contract
 *
 * This module defines the typed events exchanged over the bidirectional
 * channel. The engine does not depend on any particular socket library;
 * whatever transport carries these events only needs connect/disconnect
 * lifecycle and an authenticated identity attached at connect time.
 *
 * Events serialize as `{"event": "<kebab-case name>", "data": {...}}`,
 * so the contract survives being bridged over WebSocket text frames,
 * server-sent events, or an in-process channel unchanged.
 */
use crate::shared::error::EngineError;
use crate::shared::message::{ChatMessage, MessageKind};
use crate::shared::operation::{DocumentState, EditOperation};
use crate::shared::user::{CursorPosition, ParticipantStatus, SessionParticipant, StatusChange, UserIdentity};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events a client sends to the engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Enter (and lazily create) the session for a document
    JoinDocument {
        document_type: String,
        document_id: String,
    },
    /// Leave the document's session
    LeaveDocument {
        document_type: String,
        document_id: String,
    },
    /// Submit an edit operation based on a known revision
    DocumentOperation {
        document_type: String,
        document_id: String,
        operation: EditOperation,
        revision: u64,
    },
    /// Request the exclusive-edit lock
    DocumentLock {
        document_type: String,
        document_id: String,
    },
    /// Release the exclusive-edit lock
    DocumentUnlock {
        document_type: String,
        document_id: String,
    },
    /// Update presence status and/or cursor within a session
    UpdateStatus {
        document_type: String,
        document_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<ParticipantStatus>,
        #[serde(skip_serializing_if = "Option::is_none")]
        cursor: Option<CursorPosition>,
    },
    /// Subscribe to a chat channel
    JoinChat { channel_id: String },
    /// Unsubscribe from a chat channel
    LeaveChat { channel_id: String },
    /// Append a message to a channel
    SendMessage {
        channel_id: String,
        content: String,
        kind: MessageKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
    /// Signal that the user started typing in a channel
    TypingStart { channel_id: String },
    /// Signal that the user stopped typing in a channel
    TypingStop { channel_id: String },
    /// Request the process-wide online-user list
    GetOnlineUsers,
}

/// Events the engine sends to a client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Snapshot delivered on join (and on resync)
    DocumentState {
        state: DocumentState,
        participants: Vec<SessionParticipant>,
        /// Current lock holder, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        locked_by: Option<Uuid>,
    },
    /// A remote participant's operation, broadcast to everyone else
    DocumentOperation {
        document_type: String,
        document_id: String,
        operation: EditOperation,
        revision: u64,
    },
    /// Acknowledgment to the originating client (instead of an echo)
    OperationAck { operation_id: Uuid, revision: u64 },
    /// Operation-level failure, delivered only to the originator.
    /// `operation_id` is absent for session-level failures (lock, join).
    OperationError {
        #[serde(skip_serializing_if = "Option::is_none")]
        operation_id: Option<Uuid>,
        error: EngineError,
    },
    /// The session's lock was granted
    DocumentLocked {
        document_type: String,
        document_id: String,
        user_id: Uuid,
    },
    /// The session's lock was released
    DocumentUnlocked {
        document_type: String,
        document_id: String,
    },
    UserJoinedDocument {
        document_type: String,
        document_id: String,
        participant: SessionParticipant,
    },
    UserLeftDocument {
        document_type: String,
        document_id: String,
        user_id: Uuid,
    },
    /// Presence delta for one participant
    ParticipantStatusChanged {
        document_type: String,
        document_id: String,
        user_id: Uuid,
        changes: StatusChange,
    },
    NewMessage { message: ChatMessage },
    UserTyping {
        channel_id: String,
        user_id: Uuid,
        username: String,
    },
    UserStoppedTyping { channel_id: String, user_id: Uuid },
    UserOnline { user: UserIdentity },
    UserOffline { user_id: Uuid },
    OnlineUsers { users: Vec<UserIdentity> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_tag_shape() {
        let event = ClientEvent::JoinDocument {
            document_type: "quote".to_string(),
            document_id: "Q-100".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "join-document");
        assert_eq!(json["data"]["document_id"], "Q-100");
    }

    #[test]
    fn test_unit_variant_roundtrip() {
        let event = ClientEvent::GetOnlineUsers;
        let json = serde_json::to_string(&event).unwrap();
        let back: ClientEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn test_operation_event_roundtrip() {
        let op = EditOperation::insert(Uuid::new_v4(), "title", 0, "hello");
        let event = ClientEvent::DocumentOperation {
            document_type: "quote".to_string(),
            document_id: "Q-100".to_string(),
            operation: op,
            revision: 4,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ClientEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn test_operation_error_carries_taxonomy() {
        let event = ServerEvent::OperationError {
            operation_id: Some(Uuid::new_v4()),
            error: EngineError::StaleRevision {
                submitted: 2,
                current: 8,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "operation-error");
        assert_eq!(json["data"]["error"]["kind"], "stale_revision");
    }

    #[test]
    fn test_server_event_ack_shape() {
        let event = ServerEvent::OperationAck {
            operation_id: Uuid::new_v4(),
            revision: 7,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "operation-ack");
        assert_eq!(json["data"]["revision"], 7);
    }
}
