//! Demo binary: stands up the `vox-gateway` HTTP/control-channel surface
//! and, optionally, a local-microphone ingest session for exercising the
//! full pipeline without a browser/WebRTC client in the loop.
//!
//! With `VOX_DEMO_LOCAL_MIC=1`, the default input device is captured
//! directly into an [`IngestSession`], and every control-channel envelope
//! the session would otherwise send to a real client is logged to stdout
//! instead.

mod config;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::signal;

use config::VoiceAgentConfig;
use vox_capture::MicSource;
use vox_core::config::{SessionConfig, TranscriptionConfig};
use vox_core::{ControlChannel, IngestSession, NoopDownstreamLlm};
use vox_gateway::routes::{router, AppState};
use vox_gateway::{SessionRegistry, StubPeerConnectionFactory};

/// Logs every outbound control-channel envelope to stdout in place of a real
/// client connection, for the local-mic demo path.
struct StdoutControlChannel;

#[async_trait]
impl ControlChannel for StdoutControlChannel {
    async fn send(&self, envelope: Value) {
        println!("[control] {envelope}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,voice_agent=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let cfg = VoiceAgentConfig::load();

    let state = AppState {
        registry: Arc::new(SessionRegistry::new()),
        peer_factory: Arc::new(StubPeerConnectionFactory),
    };
    let addr: std::net::SocketAddr = cfg.gateway_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "vox-gateway listening");
    let gateway_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(state)).await {
            tracing::error!(error = %e, "gateway server exited");
        }
    });

    let mic_task = if cfg.local_mic_enabled {
        tracing::info!("starting local microphone ingest session");
        let transcription_cfg = TranscriptionConfig::from_env()?;
        let session = IngestSession::new(
            "local-mic".to_string(),
            SessionConfig::default(),
            transcription_cfg,
            Arc::new(StdoutControlChannel),
            Arc::new(NoopDownstreamLlm),
        )
        .await?;

        let mic = MicSource::new(cfg.mic.clone());
        let (capture_handle, mut frames) = mic.start();
        let ingest_task = tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                session.ingest_frame(frame).await;
            }
            session.shutdown().await;
        });
        Some((capture_handle, ingest_task))
    } else {
        None
    };

    signal::ctrl_c().await?;
    tracing::info!("shutting down");

    gateway_task.abort();
    if let Some((capture_handle, ingest_task)) = mic_task {
        capture_handle.abort();
        ingest_task.abort();
    }

    Ok(())
}
