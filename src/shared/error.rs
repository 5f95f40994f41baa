//! Engine Error Taxonomy
//!
//! Errors that can occur while coordinating a collaborative session. These
//! are shared between server and client because operation-level failures
//! travel back to the originating client over the event channel.
//!
//! # Propagation Policy
//!
//! - Operation-level errors are returned to the originating client only and
//!   never broadcast.
//! - The applier validates before mutating, so a rejected operation never
//!   corrupts document state.
//! - Conflicts are *not* errors: they are expected, recoverable states that
//!   require a resolution (see `client::conflict`).
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync` and can be safely shared across thread
//! boundaries.
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the collaborative session engine
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineError {
    /// The submitted operation references a revision the server has already
    /// superseded beyond tolerance. Recoverable: resync from a fresh
    /// snapshot and retry.
    #[error("operation based on revision {submitted}, server is at revision {current}")]
    StaleRevision { submitted: u64, current: u64 },

    /// The identity is not allowed to perform the action. Surfaced to the
    /// caller only; the connection is not torn down.
    #[error("user {user_id} is not authorized to {action}")]
    Unauthorized { user_id: Uuid, action: String },

    /// A lock was requested (or required) while held by another participant.
    /// Recoverable: wait for release or request access out of band.
    #[error("document lock is held by another participant")]
    LockConflict {
        #[serde(skip_serializing_if = "Option::is_none")]
        holder: Option<Uuid>,
    },

    /// The operation is missing required pieces or references an invalid
    /// position. Rejected, not retried automatically.
    #[error("malformed operation: {reason}")]
    MalformedOperation { reason: String },

    /// No live session exists for the document
    #[error("no active session for {document_type}/{document_id}")]
    SessionNotFound {
        document_type: String,
        document_id: String,
    },

    /// The session task has shut down while a request was in flight.
    /// Treated like a transport disconnect: rejoin to continue.
    #[error("session is no longer running")]
    SessionClosed,

    /// A resolution referenced a conflict id the client does not hold
    #[error("unknown conflict {conflict_id}")]
    UnknownConflict { conflict_id: Uuid },

    /// The field has an unresolved conflict; local submission on it is
    /// blocked until a resolution is applied
    #[error("field '{field}' has an unresolved conflict")]
    FieldConflicted { field: String },
}

impl EngineError {
    /// Create a malformed-operation error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedOperation {
            reason: reason.into(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(user_id: Uuid, action: impl Into<String>) -> Self {
        Self::Unauthorized {
            user_id,
            action: action.into(),
        }
    }

    /// Whether the client can recover by retrying after corrective action
    ///
    /// Stale revisions resolve by resync-and-retry, lock conflicts by
    /// waiting; malformed operations and authorization failures do not
    /// succeed on retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StaleRevision { .. }
                | Self::LockConflict { .. }
                | Self::SessionClosed
                | Self::FieldConflicted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_revision_display() {
        let error = EngineError::StaleRevision {
            submitted: 3,
            current: 9,
        };
        assert_eq!(
            error.to_string(),
            "operation based on revision 3, server is at revision 9"
        );
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_malformed_not_recoverable() {
        let error = EngineError::malformed("missing field");
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_lock_conflict_recoverable() {
        let error = EngineError::LockConflict {
            holder: Some(Uuid::new_v4()),
        };
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_error_serialization_tags_kind() {
        let error = EngineError::StaleRevision {
            submitted: 1,
            current: 2,
        };
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("stale_revision"));
        let back: EngineError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, back);
    }

    #[test]
    fn test_unauthorized_helper() {
        let user = Uuid::new_v4();
        let error = EngineError::unauthorized(user, "send-message");
        match error {
            EngineError::Unauthorized { user_id, action } => {
                assert_eq!(user_id, user);
                assert_eq!(action, "send-message");
            }
            _ => panic!("Expected Unauthorized"),
        }
    }
}
