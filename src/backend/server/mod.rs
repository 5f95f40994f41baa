//! WebSocket Gateway
//!
//! A thin Axum server bridging the engine's event contract over WebSocket
//! JSON text frames. The gateway owns no collaboration state of its own:
//! it deserializes `ClientEvent`s, forwards them to the engine, and drains
//! each connection's `ServerEvent` stream back into the socket.
//!
//! The engine does not depend on this module; any transport with a
//! connect/disconnect lifecycle and an authenticated identity can replace
//! it.

pub mod config;
pub mod init;
pub mod ws;

pub use config::ServerConfig;
pub use init::create_app;
