/**
 * Cosync Server Entry Point
 *
 * Starts the collaboration gateway: engine construction, WebSocket route,
 * graceful listener setup.
 */

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config = cosync::backend::server::ServerConfig::from_env();
    tracing::info!("Starting cosync server on {}", config.addr);

    let app = cosync::backend::server::create_app(config.engine);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
