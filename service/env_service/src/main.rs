use std::net::SocketAddr;

use env_service::make_app;
use gridworld_env::register_default_env as register_gridworld;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Pre-register environments for /envs and factory-based init
    register_gridworld();
    let app = make_app();

    let addr: SocketAddr = std::env::var("GRIDLAB_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string()).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Environment service listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
