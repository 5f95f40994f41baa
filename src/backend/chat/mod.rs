//! Chat Channel Management
//!
//! Per-channel message broadcast plus ephemeral typing-indicator state.
//! Chat needs none of the document machinery: messages are independent,
//! ordered-by-arrival, append-only records with no shared mutable field to
//! conflict over.
//!
//! - **`channel`** - Channel registry, membership, message append/broadcast
//! - **`typing`** - TTL-based typing state with implicit expiry

pub mod channel;
pub mod typing;

pub use channel::ChatChannelManager;
pub use typing::TypingTracker;
