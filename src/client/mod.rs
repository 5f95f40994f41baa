//! Client-Side Optimistic Layer
//!
//! The submitting client applies its own operations locally before the
//! server confirms them, and reconciles on acknowledgment or rejection.
//! This module holds the pieces that make that safe:
//!
//! - **`pending`** - Table of unacknowledged operations with a bounded
//!   lifetime (an ack that never arrives triggers rollback-and-resync)
//! - **`conflict`** - Detection of remote operations colliding with
//!   pending local ones, and deterministic resolution
//! - **`session`** - The per-document client state machine tying local
//!   echo, reconciliation and conflicts together

pub mod conflict;
pub mod pending;
pub mod session;

pub use conflict::{Conflict, ConflictDetector, Resolution, ResolutionKind};
pub use pending::{PendingOperation, PendingTable};
pub use session::{ClientSession, ConflictOutcome};
