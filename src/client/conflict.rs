/**
 * Conflict Detection and Resolution
 *
 * After a remote operation is delivered, the client compares it against its
 * own outstanding operations. A remote and a pending local operation on the
 * same field within a short time-proximity window is a conflict: the remote
 * change is *not* silently applied to the working copy, a conflict record
 * is raised, and further local submission on that field is blocked until a
 * human picks a resolution.
 *
 * A pending conflict and a resolved one are structurally distinct
 * variants, so "already resolved" can never be confused with "waiting for
 * a decision".
 *
 * Resolution is deterministic: the chosen value is a pure function of the
 * local value, the remote value and the resolution, with no wall-clock or
 * randomness in the merge path.
 */
use crate::client::pending::PendingTable;
use crate::shared::error::EngineError;
use crate::shared::operation::EditOperation;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a conflict should be retired
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    /// Keep the local edits, discard the remote change
    AcceptLocal,
    /// Apply the remote change, discard the local edits
    AcceptRemote,
    /// Apply an explicitly merged value
    Merge,
    /// Apply a manually supplied value
    Manual,
}

/// The decision that retires a conflict
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub kind: ResolutionKind,
    /// Operation ids that survive the resolution
    pub keep: Vec<Uuid>,
    /// Explicit value for merge/manual resolutions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Resolution {
    pub fn accept_local(keep: Vec<Uuid>) -> Self {
        Self {
            kind: ResolutionKind::AcceptLocal,
            keep,
            value: None,
        }
    }

    pub fn accept_remote() -> Self {
        Self {
            kind: ResolutionKind::AcceptRemote,
            keep: Vec::new(),
            value: None,
        }
    }

    pub fn manual(value: impl Into<String>) -> Self {
        Self {
            kind: ResolutionKind::Manual,
            keep: Vec::new(),
            value: Some(value.into()),
        }
    }
}

/// A detected collision between concurrent operations on one field
///
/// Both operation sets always target the same field. The pending variant
/// carries the colliding operations; the resolved variant carries only the
/// decision that retired it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    Pending {
        id: Uuid,
        field: String,
        local: Vec<EditOperation>,
        remote: Vec<EditOperation>,
        detected_at: DateTime<Utc>,
    },
    Resolved {
        id: Uuid,
        field: String,
        resolution: Resolution,
    },
}

impl Conflict {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Pending { id, .. } | Self::Resolved { id, .. } => *id,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::Pending { field, .. } | Self::Resolved { field, .. } => field,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// Detects collisions between pending local and incoming remote operations
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    window: Duration,
}

impl ConflictDetector {
    /// A detector with the given proximity window in milliseconds
    pub fn new(window_ms: u64) -> Self {
        Self {
            window: Duration::milliseconds(window_ms as i64),
        }
    }

    /// Compare a delivered remote operation against the pending table
    ///
    /// A conflict is raised when any pending local operation targets the
    /// same field and its timestamp falls within the proximity window of
    /// the remote one. Proximity compares the operations' own timestamps,
    /// not the wall clock, so detection is reproducible.
    pub fn detect(&self, pending: &PendingTable, remote: &EditOperation) -> Option<Conflict> {
        let local: Vec<EditOperation> = pending
            .ops_for_field(&remote.field)
            .into_iter()
            .filter(|op| {
                let gap = (remote.timestamp - op.timestamp).abs();
                gap <= self.window
            })
            .collect();

        if local.is_empty() {
            return None;
        }

        tracing::debug!(
            field = %remote.field,
            local = local.len(),
            "conflict detected between pending local and remote operations"
        );
        Some(Conflict::Pending {
            id: Uuid::new_v4(),
            field: remote.field.clone(),
            local,
            remote: vec![remote.clone()],
            detected_at: Utc::now(),
        })
    }
}

/// Compute the field value a resolution chooses
///
/// Pure and deterministic: identical inputs always produce the identical
/// value. Merge and manual resolutions must carry an explicit value.
pub fn resolved_value(
    local_value: &str,
    remote_value: &str,
    resolution: &Resolution,
) -> Result<String, EngineError> {
    match resolution.kind {
        ResolutionKind::AcceptLocal => Ok(local_value.to_string()),
        ResolutionKind::AcceptRemote => Ok(remote_value.to_string()),
        ResolutionKind::Merge | ResolutionKind::Manual => resolution
            .value
            .clone()
            .ok_or_else(|| EngineError::malformed("merge/manual resolution without a value")),
    }
}
