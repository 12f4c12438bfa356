//! HTTP signaling and control-channel gateway.
//!
//! Exposes the plain HTTP/WebSocket surface a caller negotiates a session
//! through: `POST /offer` to start one, `GET /{id}/control` to attach the
//! bidirectional control channel, `POST /{id}/hangup` to tear it down, and
//! `GET /health` for a liveness probe. Negotiating and decoding the actual
//! media transport (SDP offer/answer, RTP/Opus depacketization) is an
//! out-of-scope collaborator behind [`PeerConnectionFactory`] — this crate
//! wires sessions and control channels, not a WebRTC stack.

mod control_channel;
mod registry;

pub mod routes;

pub use control_channel::ChannelControlChannel;
pub use registry::{SessionEntry, SessionRegistry};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("control channel already attached for session {0}")]
    ControlChannelTaken(String),

    #[error(transparent)]
    Core(#[from] vox_core::CoreError),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Negotiates the media transport for a new session. Implemented by
/// whatever WebRTC/SDP stack a deployment wires in; the stub below is
/// sufficient for local development against the control channel and ingest
/// pipeline without pulling in a full ICE/DTLS/SRTP implementation.
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create_answer(&self, offer_sdp: &str) -> Result<String>;
}

pub struct StubPeerConnectionFactory;

#[async_trait]
impl PeerConnectionFactory for StubPeerConnectionFactory {
    async fn create_answer(&self, offer_sdp: &str) -> Result<String> {
        tracing::debug!(offer_len = offer_sdp.len(), "stub SDP answer generated");
        Ok("v=0\r\no=- 0 0 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n".to_string())
    }
}

/// Time-based id generator, matching the rest of this stack's pattern of
/// nanosecond-timestamp ids rather than pulling in a uuid crate for a
/// single call site.
pub(crate) fn gen_session_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("sess-{nanos:x}")
}
