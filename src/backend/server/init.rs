/**
 * Server Initialization
 *
 * Builds the engine and the Axum router around it.
 *
 * # Initialization Process
 *
 * 1. Construct the engine from configuration (this also starts its
 *    background tasks: presence fan-out, typing sweeper, session sweeper)
 * 2. Configure the router: the WebSocket endpoint plus a health probe
 * 3. Attach request tracing
 */
use crate::backend::engine::Engine;
use crate::backend::server::ws::ws_handler;
use crate::shared::config::EngineConfig;
use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create and configure the Axum application
pub fn create_app(config: EngineConfig) -> Router<()> {
    tracing::info!("Initializing cosync collaboration engine");
    let engine = Engine::new(config);
    create_app_with_engine(engine)
}

/// Build the router around an existing engine
///
/// Split out so tests can hold onto the engine they hand in.
pub fn create_app_with_engine(engine: Engine) -> Router<()> {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(|| async { "ok" }))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(engine)
}
