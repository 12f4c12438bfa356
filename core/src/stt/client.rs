//! Component E: transcription client.
//!
//! Owns the single persistent WebSocket connection to the transcription
//! provider for the lifetime of a session and speaks its
//! append/commit/clear/delta/completed protocol. Implements
//! [`ProviderSink`] directly so the segmenter can drive it without knowing
//! anything about the wire format underneath.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::WebSocketStream;

use crate::audio::chunker::CHUNK_BYTES;
use crate::config::{TranscriptionConfig, TurnDetectionPolicy};
use crate::segmenter::ProviderSink;
use crate::{CoreError, Result};

type WsWrite = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;
type WsRead = futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Callbacks the turn coordinator registers to receive provider events.
#[async_trait]
pub trait TranscriptionCallbacks: Send + Sync {
    async fn on_partial(&self, delta: &str);
    async fn on_final(&self, transcript: &str);
    async fn on_vad_boundary(&self, started: bool);
    async fn on_error(&self, code: &str, message: &str);
}

pub struct TranscriptionClient {
    write: Mutex<Option<WsWrite>>,
    connected: AtomicBool,
    appended_chunks: AtomicU64,
    in_flight: AtomicU64,
    min_commit_ms: u64,
}

impl TranscriptionClient {
    pub async fn connect(
        cfg: &TranscriptionConfig,
        callbacks: Arc<dyn TranscriptionCallbacks>,
    ) -> Result<Arc<Self>> {
        let request = build_request(cfg)?;
        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| CoreError::ProviderIo(e.to_string()))?;
        let (write, read) = ws_stream.split();

        let client = Arc::new(Self {
            write: Mutex::new(Some(write)),
            connected: AtomicBool::new(true),
            appended_chunks: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            min_commit_ms: cfg.min_commit_ms,
        });

        client.send_session_update(cfg).await?;

        let receive_client = Arc::clone(&client);
        tokio::spawn(async move {
            receive_client.receive_loop(read, callbacks).await;
        });

        Ok(client)
    }

    fn buffered_ms_sync(&self) -> u64 {
        self.appended_chunks.load(Ordering::Acquire) * 20
    }

    async fn send_raw(&self, msg: Value) -> Result<()> {
        let mut guard = self.write.lock().await;
        match guard.as_mut() {
            Some(w) => w
                .send(Message::Text(msg.to_string()))
                .await
                .map_err(|e| CoreError::ProviderIo(e.to_string())),
            None => Err(CoreError::ProviderIo("socket not connected".into())),
        }
    }

    async fn send_session_update(&self, cfg: &TranscriptionConfig) -> Result<()> {
        let turn_detection = match &cfg.policy {
            TurnDetectionPolicy::Local => Value::Null,
            TurnDetectionPolicy::Server {
                threshold,
                prefix_padding_ms,
                silence_ms,
            } => json!({
                "type": "server_vad",
                "threshold": threshold,
                "prefix_padding_ms": prefix_padding_ms,
                "silence_duration_ms": silence_ms,
            }),
        };
        self.send_raw(json!({
            "type": "transcription_session.update",
            "session": {
                "model": cfg.model_id,
                "language": cfg.language,
                "input_audio_format": "pcm16",
                "turn_detection": turn_detection,
            }
        }))
        .await
    }

    async fn receive_loop(
        self: Arc<Self>,
        mut read: WsRead,
        callbacks: Arc<dyn TranscriptionCallbacks>,
    ) {
        while let Some(msg) = read.next().await {
            let text = match msg {
                Ok(Message::Text(t)) => t,
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => continue,
            };
            let parsed: Value = match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(_) => continue,
            };
            let event_type = parsed.get("type").and_then(Value::as_str).unwrap_or("");
            match event_type {
                "transcription.delta" | "conversation.item.input_audio_transcription.delta" => {
                    let delta = parsed.get("delta").and_then(Value::as_str).unwrap_or("");
                    callbacks.on_partial(delta).await;
                }
                "transcription.completed"
                | "conversation.item.input_audio_transcription.completed" => {
                    let transcript = parsed
                        .get("transcript")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    callbacks.on_final(transcript).await;
                }
                "input_audio_buffer.speech_started" => {
                    callbacks.on_vad_boundary(true).await;
                }
                "input_audio_buffer.speech_stopped" => {
                    callbacks.on_vad_boundary(false).await;
                }
                "error" => {
                    let code = parsed.get("code").and_then(Value::as_str).unwrap_or("unknown");
                    let message = parsed
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    callbacks.on_error(code, message).await;
                }
                "input_audio_buffer.committed"
                | "input_audio_buffer.cleared"
                | "conversation.item.created" => {
                    tracing::debug!(event_type = event_type, "provider acknowledgment");
                }
                t if t.ends_with("session.created") || t.ends_with("session.updated") => {
                    tracing::debug!(event_type = event_type, "provider acknowledgment");
                }
                _ => {
                    tracing::debug!(event_type = event_type, "unrecognized provider event, dropping");
                }
            }
        }
        self.connected.store(false, Ordering::Release);
        callbacks.on_error("socket_closed", "transcription provider connection closed").await;
    }
}

#[async_trait]
impl ProviderSink for TranscriptionClient {
    async fn append(&self, chunk: &[u8]) -> Result<bool> {
        if chunk.len() != CHUNK_BYTES {
            return Err(CoreError::ChunkSizeMismatch {
                expected: CHUNK_BYTES,
                actual: chunk.len(),
            });
        }
        if !self.connected.load(Ordering::Acquire) {
            return Ok(false);
        }
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let encoded = base64::engine::general_purpose::STANDARD.encode(chunk);
        let result = self
            .send_raw(json!({"type": "input_audio_buffer.append", "audio": encoded}))
            .await;
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        match result {
            Ok(()) => {
                self.appended_chunks.fetch_add(1, Ordering::AcqRel);
                Ok(true)
            }
            Err(_) => {
                self.connected.store(false, Ordering::Release);
                Ok(false)
            }
        }
    }

    async fn commit(&self) -> Result<bool> {
        let buffered = self.buffered_ms_sync();
        let in_flight = self.in_flight.load(Ordering::Acquire);
        if buffered < self.min_commit_ms || in_flight * 20 >= 100 {
            return Ok(false);
        }

        let start = Instant::now();
        while self.in_flight.load(Ordering::Acquire) > 0 && start.elapsed() < Duration::from_secs(1)
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        self.send_raw(json!({"type": "input_audio_buffer.commit"}))
            .await?;
        self.appended_chunks.store(0, Ordering::Release);
        self.in_flight.store(0, Ordering::Release);
        Ok(true)
    }

    async fn clear(&self) -> Result<()> {
        self.send_raw(json!({"type": "input_audio_buffer.clear"}))
            .await?;
        self.appended_chunks.store(0, Ordering::Release);
        self.in_flight.store(0, Ordering::Release);
        Ok(())
    }

    async fn buffered_ms(&self) -> u64 {
        self.buffered_ms_sync()
    }
}

fn build_request(
    cfg: &TranscriptionConfig,
) -> Result<tokio_tungstenite::tungstenite::http::Request<()>> {
    let mut request = cfg
        .provider_url
        .as_str()
        .into_client_request()
        .map_err(|e| CoreError::Config(format!("invalid transcription provider url: {e}")))?;
    let auth = format!("Bearer {}", cfg.api_key);
    request
        .headers_mut()
        .insert(AUTHORIZATION, auth.parse().map_err(|_| {
            CoreError::Config("STT_API_KEY contains invalid header characters".into())
        })?);
    Ok(request)
}
