/**
 * Exclusive-Edit Lock State
 *
 * One advisory lock per session, held by at most one participant at any
 * instant. Grant and release are serialized through the owning session
 * actor, so this state never needs its own synchronization.
 *
 * At the engine level the lock is advisory by default: holding it is
 * broadcast so call sites can render the document read-only for everyone
 * else, but operation submission is only rejected when
 * `EngineConfig::enforce_lock` is set.
 */
use crate::shared::error::EngineError;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Lock state for one collaborative session
#[derive(Debug, Clone, Default)]
pub struct LockState {
    holder: Option<Uuid>,
    acquired_at: Option<DateTime<Utc>>,
}

impl LockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holder(&self) -> Option<Uuid> {
        self.holder
    }

    /// When the current holder acquired the lock
    pub fn held_since(&self) -> Option<DateTime<Utc>> {
        self.acquired_at
    }

    pub fn is_locked(&self) -> bool {
        self.holder.is_some()
    }

    /// Grant the lock to `user_id`
    ///
    /// Re-locking by the current holder is a no-op success; a request while
    /// someone else holds it fails with `LockConflict`.
    pub fn lock(&mut self, user_id: Uuid) -> Result<(), EngineError> {
        match self.holder {
            None => {
                self.holder = Some(user_id);
                self.acquired_at = Some(Utc::now());
                Ok(())
            }
            Some(holder) if holder == user_id => Ok(()),
            Some(holder) => Err(EngineError::LockConflict {
                holder: Some(holder),
            }),
        }
    }

    /// Release the lock; only the holder may release
    pub fn unlock(&mut self, user_id: Uuid) -> Result<(), EngineError> {
        match self.holder {
            Some(holder) if holder == user_id => {
                self.holder = None;
                self.acquired_at = None;
                Ok(())
            }
            holder => Err(EngineError::LockConflict { holder }),
        }
    }

    /// Release the lock if `user_id` holds it, as part of the leave or
    /// disconnect cascade. Returns whether a release happened, so the
    /// caller knows to broadcast an unlock event.
    pub fn release_if_held(&mut self, user_id: Uuid) -> bool {
        if self.holder == Some(user_id) {
            self.holder = None;
            self.acquired_at = None;
            true
        } else {
            false
        }
    }
}
