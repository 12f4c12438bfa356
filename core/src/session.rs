//! Session orchestration: wires components A-G into one ingest pipeline per
//! active call/connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::audio::chunker::chunk_to_bytes;
use crate::audio::{normalize, ChunkAccumulator, InputFrame, VadGate};
use crate::config::{SessionConfig, TranscriptionConfig};
use crate::control::{ControlChannel, MicGate};
use crate::dev_capture::DevCaptureSink;
use crate::segmenter::Segmenter;
use crate::stats::StatsMonitor;
use crate::stt::client::TranscriptionClient;
use crate::stt::turn::{DownstreamLlm, TurnCoordinator};
use crate::Result;

pub struct IngestSession {
    session_id: String,
    config: SessionConfig,
    chunker: Mutex<ChunkAccumulator>,
    vad: Mutex<VadGate>,
    segmenter: Arc<Segmenter>,
    mic_gate: Arc<MicGate>,
    stats: Arc<StatsMonitor>,
    stats_handle: JoinHandle<()>,
    rate_warned: AtomicBool,
}

impl IngestSession {
    pub async fn new(
        session_id: String,
        config: SessionConfig,
        transcription_cfg: TranscriptionConfig,
        control: Arc<dyn ControlChannel>,
        downstream: Arc<dyn DownstreamLlm>,
    ) -> Result<Arc<Self>> {
        let turn_coordinator = TurnCoordinator::new(transcription_cfg.policy.clone(), control, downstream);
        turn_coordinator.bind_self().await;

        let transcription_client =
            TranscriptionClient::connect(&transcription_cfg, turn_coordinator.clone()).await?;

        let provider = Arc::new(DevCaptureSink::new(
            transcription_client,
            config.dev_capture.enabled,
            config.dev_capture.output_dir.join(&session_id),
            config.normalizer.target_rate_hz,
        ));

        let segmenter = Arc::new(Segmenter::new(
            config.segmenter.pre_roll_chunks,
            config.segmenter.hangover_ms,
            config.segmenter.min_commit_ms,
            provider,
            turn_coordinator,
        ));

        let vad = VadGate::new()?;
        let stats = StatsMonitor::new();
        let stats_handle = stats.spawn_watch(session_id.clone());

        Ok(Arc::new(Self {
            session_id,
            config,
            chunker: Mutex::new(ChunkAccumulator::new()),
            vad: Mutex::new(vad),
            segmenter,
            mic_gate: Arc::new(MicGate::new()),
            stats,
            stats_handle,
            rate_warned: AtomicBool::new(false),
        }))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn mic_gate(&self) -> &Arc<MicGate> {
        &self.mic_gate
    }

    /// Apply an inbound control message to the mic gate.
    pub fn handle_control_message(&self, message_type: &str) {
        self.mic_gate.apply(message_type);
    }

    /// Normalize, chunk, VAD-gate and segment one incoming audio frame.
    pub async fn ingest_frame(&self, frame: InputFrame) {
        let samples = match normalize(&frame, self.config.normalizer.target_rate_hz, self.config.normalizer.gain_db) {
            Ok(s) => s,
            Err(e) => {
                if !self.rate_warned.swap(true, Ordering::AcqRel) {
                    tracing::warn!(session_id = %self.session_id, error = %e, "dropping frame with unsupported format");
                }
                return;
            }
        };

        let chunks = self.chunker.lock().await.push(&samples);
        for chunk in chunks {
            if !self.mic_gate.is_enabled() {
                continue;
            }
            self.stats.mark_forwarded().await;
            let is_speech = self.vad.lock().await.is_speech(&chunk);
            let bytes = chunk_to_bytes(&chunk);
            self.segmenter.process_chunk(bytes, is_speech).await;
        }
    }

    pub async fn shutdown(&self) {
        self.segmenter.shutdown().await;
        self.stats_handle.abort();
    }
}
