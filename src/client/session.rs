/**
 * Client Session State Machine
 *
 * Per-document client state: the server-confirmed shadow copy, the
 * optimistic working copy, the pending-operation table and any open
 * conflicts. The working copy reflects local edits immediately; the shadow
 * only moves on server events, so the two diverge exactly by what is
 * pending.
 *
 * Reconciliation rules:
 * - an acknowledgment confirms one pending operation into the shadow
 * - a rejection drops the operation; a stale-revision rejection also rolls
 *   the working copy back and requests a fresh snapshot
 * - a remote operation either applies to both copies, or - when it
 *   collides with pending local work - applies only to the shadow and
 *   raises a conflict that blocks that field until resolved
 */
use crate::client::conflict::{resolved_value, Conflict, ConflictDetector, Resolution};
use crate::client::pending::PendingTable;
use crate::shared::config::EngineConfig;
use crate::shared::error::EngineError;
use crate::shared::event::ServerEvent;
use crate::shared::operation::{DocumentState, EditOperation};
use crate::shared::user::UserIdentity;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// What resolving a conflict produced
#[derive(Debug, Clone)]
pub struct ConflictOutcome {
    /// The field value the resolution chose
    pub value: String,
    /// A fresh operation to submit when the chosen value diverges from
    /// server state, with the revision to base it on
    pub resubmit: Option<(EditOperation, u64)>,
}

/// Client-side state for one joined document
#[derive(Debug)]
pub struct ClientSession {
    user: UserIdentity,
    /// Server-confirmed shadow
    confirmed: DocumentState,
    /// Optimistic working copy
    local: DocumentState,
    pending: PendingTable,
    conflicts: HashMap<Uuid, Conflict>,
    detector: ConflictDetector,
    ack_timeout: Duration,
    resync_required: bool,
}

impl ClientSession {
    /// Start from the snapshot received on join
    pub fn new(user: UserIdentity, snapshot: DocumentState, config: &EngineConfig) -> Self {
        Self {
            user,
            local: snapshot.clone(),
            confirmed: snapshot,
            pending: PendingTable::new(),
            conflicts: HashMap::new(),
            detector: ConflictDetector::new(config.conflict_window_ms),
            ack_timeout: Duration::milliseconds(config.pending_ack_timeout_ms as i64),
            resync_required: false,
        }
    }

    /// The optimistic working copy the UI renders
    pub fn local(&self) -> &DocumentState {
        &self.local
    }

    /// The last server-confirmed state
    pub fn confirmed(&self) -> &DocumentState {
        &self.confirmed
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether a stale rejection or expiry means a fresh snapshot is needed
    pub fn needs_resync(&self) -> bool {
        self.resync_required
    }

    /// Conflicts still waiting for a decision
    pub fn pending_conflicts(&self) -> Vec<&Conflict> {
        self.conflicts.values().filter(|c| c.is_pending()).collect()
    }

    /// Whether local submission on a field is blocked by an open conflict
    pub fn is_field_blocked(&self, field: &str) -> bool {
        self.conflicts
            .values()
            .any(|c| c.is_pending() && c.field() == field)
    }

    /// Propose an insert, applying it locally and queueing it for submission
    pub fn insert_text(
        &mut self,
        field: &str,
        position: usize,
        text: impl Into<String>,
    ) -> Result<(EditOperation, u64), EngineError> {
        self.propose(EditOperation::insert(self.user.id, field, position, text))
    }

    /// Propose a delete
    pub fn delete_text(
        &mut self,
        field: &str,
        position: usize,
        length: usize,
    ) -> Result<(EditOperation, u64), EngineError> {
        self.propose(EditOperation::delete(self.user.id, field, position, length))
    }

    /// Propose a field replacement; the previous value is captured for
    /// conflict comparison
    pub fn update_field(
        &mut self,
        field: &str,
        value: impl Into<String>,
    ) -> Result<(EditOperation, u64), EngineError> {
        let previous = Some(self.local.field_text(field).to_string());
        self.propose(EditOperation::update(self.user.id, field, value, previous))
    }

    /// Local-echo discipline: apply to the working copy first, then queue
    fn propose(&mut self, operation: EditOperation) -> Result<(EditOperation, u64), EngineError> {
        if self.is_field_blocked(&operation.field) {
            return Err(EngineError::FieldConflicted {
                field: operation.field.clone(),
            });
        }
        self.local.apply_content(&operation)?;
        let based_on = self.confirmed.revision;
        self.pending.insert(operation.clone(), based_on);
        Ok((operation, based_on))
    }

    /// Feed one server event through the reconciliation rules
    ///
    /// Returns a newly raised conflict, if the event caused one.
    pub fn handle_event(&mut self, event: &ServerEvent) -> Option<Conflict> {
        match event {
            ServerEvent::OperationAck {
                operation_id,
                revision,
            } => {
                if let Some(acked) = self.pending.remove(*operation_id) {
                    if let Err(e) = self.confirmed.apply_content(&acked.operation) {
                        tracing::warn!("confirmed shadow diverged on ack: {}", e);
                        self.resync_required = true;
                    }
                    self.confirmed.revision = *revision;
                }
                None
            }

            ServerEvent::OperationError {
                operation_id,
                error,
            } => {
                if let Some(id) = operation_id {
                    self.pending.remove(*id);
                }
                if matches!(error, EngineError::StaleRevision { .. }) {
                    self.resync_required = true;
                    self.rollback();
                }
                None
            }

            ServerEvent::DocumentOperation {
                operation, revision, ..
            } => {
                let conflict = self.detector.detect(&self.pending, operation);

                // The remote operation is server truth either way; the
                // shadow always advances.
                if let Err(e) = self.confirmed.apply_content(operation) {
                    tracing::warn!("confirmed shadow diverged on remote operation: {}", e);
                    self.resync_required = true;
                }
                self.confirmed.revision = *revision;

                match conflict {
                    Some(conflict) => {
                        // Working copy keeps the local edits; the field is
                        // blocked until the conflict is resolved.
                        self.conflicts.insert(conflict.id(), conflict.clone());
                        Some(conflict)
                    }
                    None => {
                        if let Err(e) = self.local.apply_content(operation) {
                            tracing::warn!("working copy rejected remote operation: {}", e);
                            self.resync_required = true;
                        }
                        self.local.revision = *revision;
                        None
                    }
                }
            }

            ServerEvent::DocumentState { state, .. } => {
                self.resync(state.clone());
                None
            }

            // Presence, lock and chat events carry no document content.
            _ => None,
        }
    }

    /// Apply a resolution, retiring the conflict
    ///
    /// The chosen value becomes the new local truth for the field and the
    /// field is unblocked. If the value diverges from server state, a fresh
    /// update operation against the latest confirmed revision is returned
    /// for submission.
    pub fn resolve_conflict(
        &mut self,
        conflict_id: Uuid,
        resolution: Resolution,
    ) -> Result<ConflictOutcome, EngineError> {
        let field = match self.conflicts.get(&conflict_id) {
            Some(Conflict::Pending { field, .. }) => field.clone(),
            _ => return Err(EngineError::UnknownConflict { conflict_id }),
        };

        let local_value = self.local.field_text(&field).to_string();
        let remote_value = self.confirmed.field_text(&field).to_string();
        let value = resolved_value(&local_value, &remote_value, &resolution)?;

        // The conflicting pending operations are superseded by the
        // resolution; drop them before resubmitting.
        for op in self.pending.ops_for_field(&field) {
            self.pending.remove(op.id);
        }

        self.conflicts.insert(
            conflict_id,
            Conflict::Resolved {
                id: conflict_id,
                field: field.clone(),
                resolution,
            },
        );

        self.local.content.insert(field.clone(), value.clone());
        self.local.revision = self.confirmed.revision;

        let resubmit = if value != remote_value {
            let operation = EditOperation::update(
                self.user.id,
                field.clone(),
                value.clone(),
                Some(remote_value),
            );
            let based_on = self.confirmed.revision;
            self.pending.insert(operation.clone(), based_on);
            Some((operation, based_on))
        } else {
            None
        };

        Ok(ConflictOutcome { value, resubmit })
    }

    /// Expire pending operations whose ack never arrived
    ///
    /// Returns whether anything expired; if so the working copy has been
    /// rolled back and a resync is required.
    pub fn expire_pending(&mut self) -> bool {
        let expired = self.pending.take_expired(Utc::now(), self.ack_timeout);
        if expired.is_empty() {
            return false;
        }
        tracing::warn!("{} pending operations expired without ack", expired.len());
        self.resync_required = true;
        self.rollback();
        true
    }

    /// Rebuild the working copy from the shadow plus surviving pending ops
    fn rollback(&mut self) {
        self.local = self.confirmed.clone();
        for operation in self.pending.in_order() {
            if self.local.apply_content(&operation).is_err() {
                self.pending.remove(operation.id);
            }
        }
    }

    /// Adopt a fresh snapshot and replay local intent on top of it
    fn resync(&mut self, snapshot: DocumentState) {
        self.confirmed = snapshot;
        self.resync_required = false;
        self.rollback();
    }
}
