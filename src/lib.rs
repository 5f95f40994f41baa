//! Cosync - Collaborative Session Engine
//!
//! Cosync is the real-time collaboration core of a larger business suite:
//! multiple users editing the same document and chatting in the same channel
//! simultaneously, with presence tracking, operation ordering, conflict
//! detection and exclusive-edit locking.
//!
//! # Overview
//!
//! The engine synchronizes a shared, mutable document and an associated chat
//! channel across concurrent clients over a generic bidirectional event
//! channel. It deliberately does *not* implement an operational-transform or
//! CRDT merge algorithm: concurrent edits to the same field are surfaced as
//! conflicts for a human to resolve, not silently merged.
//!
//! # Module Structure
//!
//! The library is organized into three main modules:
//!
//! - **`shared`** - Types shared between server and client
//!   - User identity, edit operations, document state
//!   - The client/server event contract
//!   - Error taxonomy and engine configuration
//!
//! - **`backend`** - Server-side engine
//!   - Per-document session actors (single serialized writer per document)
//!   - Operation log and applier with revision tracking
//!   - Presence registry, lock state, chat channels with typing indicators
//!   - A thin Axum WebSocket gateway binary (`cosync-server`)
//!
//! - **`client`** - Client-side optimistic layer
//!   - Pending-operation table with local echo and reconciliation
//!   - Conflict detection against incoming remote operations
//!   - Conflict resolution (accept-local / accept-remote / manual merge)
//!
//! # Concurrency Model
//!
//! Each live session runs one tokio task consuming an inbox of typed
//! commands, which is the single serialized mutation path for that
//! document's state. Cross-document operations proceed fully in parallel.
//! Process-wide presence uses `tokio::sync::broadcast`; everything else
//! travels over per-connection mpsc channels.
//!
//! # Error Handling
//!
//! The library uses Rust's standard error handling:
//!
//! - `Result<T, EngineError>` for fallible operations
//! - Operation-level failures are delivered only to the originating client
//!   and never corrupt authoritative document state

/// Shared types and data structures
pub mod shared;

/// Backend server-side engine
pub mod backend;

/// Client-side optimistic editing layer
pub mod client;
