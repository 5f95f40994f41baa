/**
 * Pending Operation Table
 *
 * Tracks operations the client has applied locally but the server has not
 * yet acknowledged. Every entry has a bounded lifetime: if no ack or error
 * arrives within the timeout, the entry is expired and the client rolls
 * back to the last confirmed snapshot and resyncs, rather than trusting a
 * fixed delay to have cleared things up.
 */
use crate::shared::operation::EditOperation;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// One locally applied, unacknowledged operation
#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub operation: EditOperation,
    /// Revision the operation was submitted against
    pub based_on: u64,
    pub submitted_at: DateTime<Utc>,
}

/// Table of pending operations keyed by operation id
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: HashMap<Uuid, PendingOperation>,
    /// Submission order, for replay after a resync
    order: Vec<Uuid>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, operation: EditOperation, based_on: u64) {
        let id = operation.id;
        self.entries.insert(
            id,
            PendingOperation {
                operation,
                based_on,
                submitted_at: Utc::now(),
            },
        );
        self.order.push(id);
    }

    /// Remove an entry on acknowledgment (or rejection)
    pub fn remove(&mut self, operation_id: Uuid) -> Option<PendingOperation> {
        let removed = self.entries.remove(&operation_id);
        if removed.is_some() {
            self.order.retain(|id| *id != operation_id);
        }
        removed
    }

    pub fn contains(&self, operation_id: Uuid) -> bool {
        self.entries.contains_key(&operation_id)
    }

    /// Pending operations targeting a field, in submission order
    pub fn ops_for_field(&self, field: &str) -> Vec<EditOperation> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter(|p| p.operation.field == field)
            .map(|p| p.operation.clone())
            .collect()
    }

    /// All pending operations in submission order
    pub fn in_order(&self) -> Vec<EditOperation> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|p| p.operation.clone())
            .collect()
    }

    /// Remove and return entries older than the timeout
    pub fn take_expired(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<PendingOperation> {
        let expired_ids: Vec<Uuid> = self
            .order
            .iter()
            .filter(|id| {
                self.entries
                    .get(id)
                    .map(|p| now - p.submitted_at >= timeout)
                    .unwrap_or(false)
            })
            .copied()
            .collect();
        expired_ids
            .into_iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
