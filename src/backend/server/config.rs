/**
 * Server Configuration
 *
 * Configuration for the gateway binary: bind address plus the engine
 * tunables. Values come from environment variables with sensible local
 * defaults; the engine tunables come from an optional TOML file named by
 * `COSYNC_CONFIG`.
 *
 * Configuration problems are logged but never prevent startup.
 */
use crate::shared::config::EngineConfig;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the gateway listens on
    pub addr: SocketAddr,
    /// Engine tunables
    pub engine: EngineConfig,
}

impl ServerConfig {
    /// Load from the environment
    ///
    /// - `SERVER_PORT` - listen port (default 3000)
    /// - `COSYNC_CONFIG` - optional path to an engine TOML file
    pub fn from_env() -> Self {
        let port = std::env::var("SERVER_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let engine = match std::env::var("COSYNC_CONFIG") {
            Ok(path) => EngineConfig::load(&PathBuf::from(path)),
            Err(_) => {
                tracing::info!("COSYNC_CONFIG not set, using default engine configuration");
                EngineConfig::default()
            }
        };

        Self { addr, engine }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        // Scoped to variables this test does not set: the default port and
        // engine tunables come back.
        let config = ServerConfig::from_env();
        assert_eq!(config.engine.revision_tolerance, 1);
    }
}
