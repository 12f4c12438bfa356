//! Axum handlers: `POST /offer`, `GET /{id}/control`, `POST /{id}/hangup`,
//! `GET /health`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;

use vox_core::config::{SessionConfig, TranscriptionConfig};
use vox_core::{IngestSession, NoopDownstreamLlm};

use crate::control_channel::ChannelControlChannel;
use crate::registry::SessionRegistry;
use crate::{gen_session_id, PeerConnectionFactory};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub peer_factory: Arc<dyn PeerConnectionFactory>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/offer", post(offer))
        .route("/:id/hangup", post(hangup))
        .route("/:id/control", get(control_ws))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    active_sessions: usize,
    timestamp: String,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        active_sessions: state.registry.len(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

fn truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// `POST /offer` — body is the raw SDP offer (`application/sdp`), not JSON;
/// the query parameter `enable_stt` (default true) gates whether a
/// transcription session is actually started for this call.
async fn offer(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    offer_sdp: String,
) -> Result<Response, (StatusCode, String)> {
    let enable_stt = params
        .get("enable_stt")
        .map(|v| truthy(v))
        .unwrap_or(true);

    let answer = state
        .peer_factory
        .create_answer(&offer_sdp)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;

    let session_id = gen_session_id();

    if enable_stt {
        let transcription_cfg = TranscriptionConfig::from_env()
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

        let (control, control_rx) = ChannelControlChannel::new(64);
        let session = IngestSession::new(
            session_id.clone(),
            SessionConfig::default(),
            transcription_cfg,
            Arc::new(control),
            Arc::new(NoopDownstreamLlm),
        )
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;

        state.registry.insert(session_id.clone(), session, control_rx);
    }

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(axum::http::header::CONTENT_TYPE, "application/sdp")
        .body(answer)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .into_response();
    let headers = response.headers_mut();
    headers.insert(
        "X-Session-Id",
        HeaderValue::from_str(&session_id).unwrap_or(HeaderValue::from_static("")),
    );
    headers.insert(
        "X-Call-Id",
        HeaderValue::from_str(&session_id).unwrap_or(HeaderValue::from_static("")),
    );
    Ok(response)
}

async fn hangup(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.registry.remove(&id).await {
        Some(_) => StatusCode::OK,
        None => StatusCode::NOT_FOUND,
    }
}

async fn control_ws(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(entry) = state.registry.get(&id) else {
        return (StatusCode::NOT_FOUND, "unknown session").into_response();
    };

    let control_rx = {
        let mut guard = entry.control_rx.lock().await;
        guard.take()
    };
    let Some(control_rx) = control_rx else {
        return (
            StatusCode::CONFLICT,
            "control channel already attached for this session",
        )
            .into_response();
    };

    ws.on_upgrade(move |socket| handle_control_socket(socket, entry.session.clone(), control_rx))
}

async fn handle_control_socket(
    socket: WebSocket,
    session: Arc<IngestSession>,
    mut control_rx: tokio::sync::mpsc::Receiver<serde_json::Value>,
) {
    let (mut sink, mut stream) = socket.split();

    let forward = tokio::spawn(async move {
        while let Some(envelope) = control_rx.recv().await {
            if sink.send(Message::Text(envelope.to_string())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        if let Message::Text(text) = msg {
            if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&text) {
                if let Some(message_type) = parsed.get("type").and_then(serde_json::Value::as_str) {
                    session.handle_control_message(message_type);
                }
            }
        }
    }

    forward.abort();
}
