/**
 * Edit Operations and Document State
 *
 * This module defines the atomic change proposal (`EditOperation`) and the
 * authoritative, server-confirmed document content (`DocumentState`).
 *
 * Operations are immutable once created; they are appended to a per-document
 * log and never mutated. Document content is field-keyed text; insert and
 * delete address a field's text by character position, update replaces a
 * field's value wholesale.
 */
use crate::shared::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The kind of change an operation proposes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationKind {
    /// Insert `text` at `position` (character offset) in the field's text
    Insert { position: usize, text: String },
    /// Delete `length` characters starting at `position`
    Delete { position: usize, length: usize },
    /// Replace the field's value wholesale
    ///
    /// `previous` carries the value the client saw before editing; it is
    /// used only in client-side conflict comparison, never by the applier.
    Update {
        value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        previous: Option<String>,
    },
}

/// An atomic change proposal for one field of a document
///
/// The id is client-generated and unique; the server uses it for duplicate
/// suppression and acknowledgment, the client for reconciling its pending
/// table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditOperation {
    /// Client-generated unique operation id
    pub id: Uuid,
    /// Originating user
    pub user_id: Uuid,
    /// Target field identifier
    pub field: String,
    /// The proposed change
    #[serde(flatten)]
    pub kind: OperationKind,
    /// Client-side creation time, used for conflict proximity checks
    pub timestamp: DateTime<Utc>,
}

impl EditOperation {
    pub fn insert(user_id: Uuid, field: impl Into<String>, position: usize, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            field: field.into(),
            kind: OperationKind::Insert {
                position,
                text: text.into(),
            },
            timestamp: Utc::now(),
        }
    }

    pub fn delete(user_id: Uuid, field: impl Into<String>, position: usize, length: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            field: field.into(),
            kind: OperationKind::Delete { position, length },
            timestamp: Utc::now(),
        }
    }

    pub fn update(
        user_id: Uuid,
        field: impl Into<String>,
        value: impl Into<String>,
        previous: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            field: field.into(),
            kind: OperationKind::Update {
                value: value.into(),
                previous,
            },
            timestamp: Utc::now(),
        }
    }

    /// Validate the operation's shape without applying it
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.field.is_empty() {
            return Err(EngineError::malformed("operation has an empty field identifier"));
        }
        if let OperationKind::Delete { length, .. } = &self.kind {
            if *length == 0 {
                return Err(EngineError::malformed("delete operation with zero length"));
            }
        }
        Ok(())
    }
}

/// The authoritative, server-confirmed content for one document
///
/// The revision number is strictly increasing and is incremented exactly
/// once per successfully applied operation. The session actor's applier
/// path is the single writer; every other component only reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentState {
    pub document_type: String,
    pub document_id: String,
    /// Field-keyed content
    pub content: BTreeMap<String, String>,
    /// Monotonically increasing revision counter
    pub revision: u64,
    /// Users currently active in the session
    pub active_users: Vec<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentState {
    /// Create an empty document at revision 0
    pub fn new(document_type: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            document_type: document_type.into(),
            document_id: document_id.into(),
            content: BTreeMap::new(),
            revision: 0,
            active_users: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// The text of one field, empty if the field has never been written
    pub fn field_text(&self, field: &str) -> &str {
        self.content.get(field).map(String::as_str).unwrap_or("")
    }

    /// Apply an operation's content change, without touching the revision
    ///
    /// Validates before mutating: a rejected operation leaves the content
    /// untouched. Revision accounting belongs to the operation log, which
    /// owns the one-increment-per-applied-operation invariant.
    pub fn apply_content(&mut self, operation: &EditOperation) -> Result<(), EngineError> {
        operation.validate()?;
        match &operation.kind {
            OperationKind::Insert { position, text } => {
                let existing = self.content.get(&operation.field).cloned().unwrap_or_default();
                let inserted = insert_at(&existing, *position, text).ok_or_else(|| {
                    EngineError::malformed(format!(
                        "insert position {} beyond end of field '{}'",
                        position, operation.field
                    ))
                })?;
                self.content.insert(operation.field.clone(), inserted);
            }
            OperationKind::Delete { position, length } => {
                let existing = self.content.get(&operation.field).cloned().unwrap_or_default();
                let deleted = delete_range(&existing, *position, *length).ok_or_else(|| {
                    EngineError::malformed(format!(
                        "delete range {}..{} beyond end of field '{}'",
                        position,
                        position + length,
                        operation.field
                    ))
                })?;
                self.content.insert(operation.field.clone(), deleted);
            }
            OperationKind::Update { value, .. } => {
                self.content.insert(operation.field.clone(), value.clone());
            }
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Insert `text` at character offset `position`, None if out of range
fn insert_at(existing: &str, position: usize, text: &str) -> Option<String> {
    let byte_pos = char_to_byte(existing, position)?;
    let mut out = String::with_capacity(existing.len() + text.len());
    out.push_str(&existing[..byte_pos]);
    out.push_str(text);
    out.push_str(&existing[byte_pos..]);
    Some(out)
}

/// Remove `length` characters starting at offset `position`, None if out of range
fn delete_range(existing: &str, position: usize, length: usize) -> Option<String> {
    let start = char_to_byte(existing, position)?;
    let end = char_to_byte(existing, position + length)?;
    let mut out = String::with_capacity(existing.len());
    out.push_str(&existing[..start]);
    out.push_str(&existing[end..]);
    Some(out)
}

/// Map a character offset to a byte offset; offsets address chars, not bytes
fn char_to_byte(s: &str, offset: usize) -> Option<usize> {
    if offset == 0 {
        return Some(0);
    }
    let mut count = 0;
    for (byte_idx, _) in s.char_indices() {
        if count == offset {
            return Some(byte_idx);
        }
        count += 1;
    }
    // Offset equal to the character count addresses the end of the string.
    if offset == count {
        Some(s.len())
    } else {
        None
    }
}
