//! Engine configuration
//!
//! Tunables for the session engine. Configuration is loaded from an
//! optional TOML file; every field has a default, so a missing or partial
//! file never prevents startup. Loading problems are logged and the
//! defaults are used.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Tunables for the collaborative session engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How many revisions behind current a submitted operation may be.
    /// The default of 1 accepts the current or immediately-prior revision;
    /// anything older is rejected as stale.
    pub revision_tolerance: u64,

    /// Proximity window (milliseconds) within which a pending local
    /// operation and an incoming remote operation on the same field are
    /// treated as conflicting.
    pub conflict_window_ms: u64,

    /// Idle timeout (milliseconds) after which a typing indicator expires
    /// even without an explicit stop signal.
    pub typing_idle_ms: u64,

    /// How often (milliseconds) the typing sweeper looks for expired
    /// indicators.
    pub typing_sweep_ms: u64,

    /// How long (milliseconds) a submitted operation may wait for an
    /// acknowledgment before the client rolls it back and resyncs.
    pub pending_ack_timeout_ms: u64,

    /// Whether the applier rejects operations from non-lock-holders while
    /// a lock is held. When false the lock is advisory: it is broadcast so
    /// call sites can treat the document as read-only, but the engine
    /// still accepts operations.
    pub enforce_lock: bool,

    /// Capacity of the process-wide presence broadcast channel.
    pub presence_capacity: usize,

    /// How many recent messages a chat channel replays to a joining user.
    pub chat_history_limit: usize,

    /// How often (seconds) the session registry sweeps out sessions whose
    /// actors have terminated.
    pub session_sweep_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            revision_tolerance: 1,
            conflict_window_ms: 1_000,
            typing_idle_ms: 1_000,
            typing_sweep_ms: 250,
            pending_ack_timeout_ms: 5_000,
            enforce_lock: false,
            presence_capacity: 1_000,
            chat_history_limit: 100,
            session_sweep_secs: 60,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from a TOML file, falling back to defaults on any problem
    ///
    /// Missing file and parse failures are logged, not fatal: the engine
    /// always starts with a usable configuration.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => match Self::from_toml(&text) {
                Ok(config) => {
                    tracing::info!("Loaded engine configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::warn!(
                    "Engine configuration file {} not found. Using defaults.",
                    path.display()
                );
                Self::default()
            }
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(String),
}
