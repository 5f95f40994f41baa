//! Collaborative Session Management
//!
//! A session is the live collaboration context for one document: its
//! participants, its lock state, and its authoritative content. Each live
//! session runs as one actor task consuming an inbox of typed commands,
//! which is the single serialized mutation path required for the revision
//! counter to be meaningful.
//!
//! # Module Structure
//!
//! - **`state`** - Session key and in-actor state (participants, lock, content)
//! - **`actor`** - The per-document command loop and its typed handle
//! - **`manager`** - Registry of live sessions with lazy creation and sweeping

pub mod actor;
pub mod manager;
pub mod state;

pub use actor::{JoinSnapshot, SessionCommand, SessionHandle};
pub use manager::SessionManager;
pub use state::{SessionKey, SessionState};
