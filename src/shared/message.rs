/**
 * Chat Message Data Structure
 *
 * This module defines the ChatMessage struct used for channel chat.
 * Messages are append-only records ordered by arrival at the server; they
 * carry no shared mutable field, so chat needs no acknowledgment or
 * conflict handling.
 */
use crate::shared::user::UserIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of content a message carries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain text
    Text,
    /// File reference (metadata carries the pointer)
    File,
    /// System-generated notice
    System,
}

/// A single chat entry
///
/// The id and created timestamp are assigned by the server when the message
/// is appended; clients never pick message ids. Messages are never mutated
/// after append except for edit-marking metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Server-assigned message id
    pub id: Uuid,
    pub channel_id: String,
    pub author_id: Uuid,
    pub author_name: String,
    pub content: String,
    pub kind: MessageKind,
    /// Arbitrary metadata (attachments, mentions, rendering hints)
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// Create a new message with a server-assigned id and timestamp
    pub fn new(
        channel_id: impl Into<String>,
        author: &UserIdentity,
        content: impl Into<String>,
        kind: MessageKind,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel_id: channel_id.into(),
            author_id: author.id,
            author_name: author.username.clone(),
            content: content.into(),
            kind,
            metadata: metadata.unwrap_or(serde_json::Value::Null),
            created_at: Utc::now(),
            edited_at: None,
        }
    }

    /// Create a system notice for a channel
    pub fn system(channel_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel_id: channel_id.into(),
            author_id: Uuid::nil(),
            author_name: "system".to_string(),
            content: content.into(),
            kind: MessageKind::System,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
            edited_at: None,
        }
    }

    /// Mark the message as edited now
    pub fn mark_edited(&mut self) {
        self.edited_at = Some(Utc::now());
    }
}
