//! Backend Module
//!
//! This module contains the server-side collaborative session engine and
//! the thin WebSocket gateway that exposes it.
//!
//! # Architecture
//!
//! The backend is organized into focused submodules:
//!
//! - **`engine`** - Facade wiring presence, sessions and chat behind a
//!   transport-agnostic connect/handle-event/disconnect API
//! - **`session`** - Per-document session actors, their state and registry
//! - **`oplog`** - Operation log and applier (the single writer of document
//!   content)
//! - **`lock`** - Exclusive-edit lock state
//! - **`presence`** - Process-wide online registry and per-document views
//! - **`chat`** - Chat channels and typing indicators
//! - **`transport`** - The engine's half of the transport contract
//! - **`server`** - Axum WebSocket gateway, configuration and startup
//!
//! # State Management
//!
//! Document content is mutated only inside a session actor, one command at
//! a time in receipt order. Registries (sessions, connections, channels,
//! presence) live behind `Arc<RwLock<>>`; presence transitions travel over
//! `tokio::sync::broadcast`; everything addressed to a specific client
//! travels over that client's mpsc event stream.

/// Engine facade
pub mod engine;

/// Collaborative session actors and registry
pub mod session;

/// Operation log and applier
pub mod oplog;

/// Exclusive-edit lock state
pub mod lock;

/// Presence tracking
pub mod presence;

/// Chat channels and typing indicators
pub mod chat;

/// Transport contract
pub mod transport;

/// WebSocket gateway and server startup
pub mod server;

/// Re-export commonly used types
pub use engine::Engine;
pub use oplog::{ApplyOutcome, DocumentCore, LogEntry};
pub use presence::PresenceRegistry;
pub use session::{SessionKey, SessionManager};
pub use transport::{ClientHandle, ConnectionId};
