//! Shared Module
//!
//! This module contains types and data structures that are shared between
//! the server-side engine and the client-side optimistic layer. All types
//! are designed for serialization over the bidirectional event channel.

/// User identity and session participants
pub mod user;

/// Edit operations and document state
pub mod operation;

/// Chat message data structures
pub mod message;

/// The client/server event contract
pub mod event;

/// Engine error taxonomy
pub mod error;

/// Engine configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use user::{CursorPosition, ParticipantStatus, SessionParticipant, StatusChange, UserIdentity};
pub use operation::{DocumentState, EditOperation, OperationKind};
pub use message::{ChatMessage, MessageKind};
pub use event::{ClientEvent, ServerEvent};
pub use error::EngineError;
pub use config::EngineConfig;
