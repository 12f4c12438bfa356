use std::net::SocketAddr;
use std::sync::Arc;

use vox_gateway::routes::{router, AppState};
use vox_gateway::{SessionRegistry, StubPeerConnectionFactory};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().compact().init();

    let state = AppState {
        registry: Arc::new(SessionRegistry::new()),
        peer_factory: Arc::new(StubPeerConnectionFactory),
    };

    let addr: SocketAddr = std::env::var("VOX_GATEWAY_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8088".into())
        .parse()?;

    tracing::info!(%addr, "vox-gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}
