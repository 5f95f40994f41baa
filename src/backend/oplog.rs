/**
 * Operation Log & Applier
 *
 * This module owns the authoritative mutation path for one document: it
 * validates an incoming operation against the document's revision, applies
 * it to the content, increments the revision exactly once, and appends the
 * operation to an immutable log.
 *
 * Operations are applied strictly in receipt order; no reordering or
 * transformation is attempted. Concurrent edits to the same field are the
 * client-side conflict detector's problem, not the applier's.
 */
use crate::shared::config::EngineConfig;
use crate::shared::error::EngineError;
use crate::shared::operation::{DocumentState, EditOperation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One applied operation and the revision it produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub revision: u64,
    pub operation: EditOperation,
}

/// Outcome of submitting an operation to the applier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Newly applied at this revision; rebroadcast to the other participants
    Applied(u64),
    /// Operation id was already applied at this revision; ack again, do not
    /// rebroadcast or double-apply
    Duplicate(u64),
}

impl ApplyOutcome {
    pub fn revision(&self) -> u64 {
        match self {
            Self::Applied(rev) | Self::Duplicate(rev) => *rev,
        }
    }
}

/// Authoritative document content plus its append-only operation log
#[derive(Debug, Clone)]
pub struct DocumentCore {
    state: DocumentState,
    entries: Vec<LogEntry>,
    /// Revision each applied operation id produced, for duplicate suppression
    applied: HashMap<Uuid, u64>,
}

impl DocumentCore {
    pub fn new(document_type: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            state: DocumentState::new(document_type, document_id),
            entries: Vec::new(),
            applied: HashMap::new(),
        }
    }

    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DocumentState {
        &mut self.state
    }

    pub fn revision(&self) -> u64 {
        self.state.revision
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Validate and apply one operation submitted against `based_on`
    ///
    /// Validation happens before any mutation, so a rejected operation
    /// leaves both content and revision untouched.
    pub fn apply(
        &mut self,
        operation: EditOperation,
        based_on: u64,
        config: &EngineConfig,
        locked_by: Option<Uuid>,
    ) -> Result<ApplyOutcome, EngineError> {
        if let Some(revision) = self.applied.get(&operation.id) {
            return Ok(ApplyOutcome::Duplicate(*revision));
        }

        if based_on.saturating_add(config.revision_tolerance) < self.state.revision {
            return Err(EngineError::StaleRevision {
                submitted: based_on,
                current: self.state.revision,
            });
        }

        if config.enforce_lock {
            if let Some(holder) = locked_by {
                if holder != operation.user_id {
                    return Err(EngineError::LockConflict {
                        holder: Some(holder),
                    });
                }
            }
        }

        self.state.apply_content(&operation)?;
        self.state.revision += 1;
        let revision = self.state.revision;
        self.applied.insert(operation.id, revision);
        self.entries.push(LogEntry { revision, operation });
        Ok(ApplyOutcome::Applied(revision))
    }

    /// Rebuild content from revision 0 by replaying the full log
    ///
    /// Replay must reproduce the live state exactly; tests lean on this to
    /// check that the log is a faithful history.
    pub fn replay(&self) -> DocumentState {
        let mut state = DocumentState::new(
            self.state.document_type.clone(),
            self.state.document_id.clone(),
        );
        for entry in &self.entries {
            // Entries were validated when first applied.
            if let Err(e) = state.apply_content(&entry.operation) {
                tracing::error!(revision = entry.revision, "log replay failed: {}", e);
                break;
            }
            state.revision += 1;
        }
        state.active_users = self.state.active_users.clone();
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::operation::OperationKind;

    fn core() -> DocumentCore {
        DocumentCore::new("quote", "Q-100")
    }

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn test_apply_increments_revision_once() {
        let mut core = core();
        let op = EditOperation::insert(Uuid::new_v4(), "title", 0, "hello");
        let outcome = core.apply(op, 0, &config(), None).unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied(1));
        assert_eq!(core.revision(), 1);
        assert_eq!(core.state().field_text("title"), "hello");
    }

    #[test]
    fn test_duplicate_submission_is_a_noop() {
        let mut core = core();
        let op = EditOperation::insert(Uuid::new_v4(), "title", 0, "hello");
        core.apply(op.clone(), 0, &config(), None).unwrap();
        let outcome = core.apply(op, 1, &config(), None).unwrap();
        assert_eq!(outcome, ApplyOutcome::Duplicate(1));
        assert_eq!(core.revision(), 1);
        assert_eq!(core.state().field_text("title"), "hello");
        assert_eq!(core.entries().len(), 1);
    }

    #[test]
    fn test_stale_revision_rejected() {
        let mut core = core();
        let user = Uuid::new_v4();
        for i in 0..4 {
            let op = EditOperation::insert(user, "body", i, "x");
            core.apply(op, i as u64, &config(), None).unwrap();
        }
        // Tolerance 1: an operation based on revision 2 while current is 4
        // is stale.
        let op = EditOperation::insert(user, "body", 0, "y");
        let err = core.apply(op, 2, &config(), None).unwrap_err();
        assert_eq!(
            err,
            EngineError::StaleRevision {
                submitted: 2,
                current: 4
            }
        );
        assert_eq!(core.revision(), 4);
    }

    #[test]
    fn test_immediately_prior_revision_accepted() {
        let mut core = core();
        let user = Uuid::new_v4();
        let op = EditOperation::update(user, "title", "Draft A", None);
        core.apply(op, 0, &config(), None).unwrap();
        // Based on revision 0 while current is 1: within tolerance.
        let op = EditOperation::update(user, "title", "Draft B", None);
        let outcome = core.apply(op, 0, &config(), None).unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied(2));
        assert_eq!(core.state().field_text("title"), "Draft B");
    }

    #[test]
    fn test_rejected_operation_leaves_state_untouched() {
        let mut core = core();
        let op = EditOperation::insert(Uuid::new_v4(), "title", 10, "beyond");
        assert!(core.apply(op, 0, &config(), None).is_err());
        assert_eq!(core.revision(), 0);
        assert!(core.entries().is_empty());
    }

    #[test]
    fn test_advisory_lock_does_not_block_apply() {
        let mut core = core();
        let holder = Uuid::new_v4();
        let other = Uuid::new_v4();
        let op = EditOperation::insert(other, "title", 0, "hi");
        let outcome = core.apply(op, 0, &config(), Some(holder)).unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied(1));
    }

    #[test]
    fn test_enforced_lock_rejects_non_holder() {
        let mut core = core();
        let mut config = config();
        config.enforce_lock = true;
        let holder = Uuid::new_v4();
        let other = Uuid::new_v4();

        let op = EditOperation::insert(other, "title", 0, "hi");
        let err = core.apply(op, 0, &config, Some(holder)).unwrap_err();
        assert_eq!(
            err,
            EngineError::LockConflict {
                holder: Some(holder)
            }
        );

        let op = EditOperation::insert(holder, "title", 0, "hi");
        assert!(core.apply(op, 0, &config, Some(holder)).is_ok());
    }

    #[test]
    fn test_replay_reproduces_content() {
        let mut core = core();
        let user = Uuid::new_v4();
        core.apply(EditOperation::insert(user, "title", 0, "hello"), 0, &config(), None)
            .unwrap();
        core.apply(EditOperation::insert(user, "title", 5, " world"), 1, &config(), None)
            .unwrap();
        core.apply(EditOperation::delete(user, "title", 0, 6), 2, &config(), None)
            .unwrap();
        core.apply(
            EditOperation::update(user, "status", "open", None),
            3,
            &config(),
            None,
        )
        .unwrap();

        let replayed = core.replay();
        assert_eq!(replayed.content, core.state().content);
        assert_eq!(replayed.revision, core.revision());
    }

    #[test]
    fn test_log_preserves_operation_order() {
        let mut core = core();
        let user = Uuid::new_v4();
        core.apply(EditOperation::update(user, "title", "a", None), 0, &config(), None)
            .unwrap();
        core.apply(EditOperation::update(user, "title", "b", None), 1, &config(), None)
            .unwrap();
        let revisions: Vec<u64> = core.entries().iter().map(|e| e.revision).collect();
        assert_eq!(revisions, vec![1, 2]);
        match &core.entries()[1].operation.kind {
            OperationKind::Update { value, .. } => assert_eq!(value, "b"),
            _ => panic!("Expected update"),
        }
    }
}
