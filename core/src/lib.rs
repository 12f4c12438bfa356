//! vox-core: real-time voice ingest pipeline.
//!
//! Normalizes incoming audio frames, accumulates them into fixed 20ms PCM
//! chunks, gates them through a voice-activity detector, segments speech with
//! pre-roll and hangover, and drives a persistent transcription provider
//! socket through an append/commit/clear protocol. A turn coordinator sits on
//! top to assemble provider transcripts into discrete conversational turns,
//! and a control channel carries session-lifecycle and VAD-boundary events
//! back out to whoever is driving the session.

pub mod audio;
pub mod config;
pub mod control;
pub mod dev_capture;
pub mod segmenter;
pub mod session;
pub mod stats;
pub mod stt;

pub use config::{
    DevCaptureConfig, NormalizerConfig, SegmenterConfig, SessionConfig, TranscriptionConfig,
    TurnDetectionPolicy,
};
pub use control::{ControlChannel, MicGate};
pub use segmenter::{ProviderSink, Segment, Segmenter, SegmenterObserver};
pub use session::IngestSession;
pub use stats::StatsMonitor;
pub use stt::client::{TranscriptionCallbacks, TranscriptionClient};
pub use stt::turn::{DownstreamLlm, NoopDownstreamLlm, TurnCoordinator};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unsupported sample rate: {0}Hz")]
    UnsupportedSampleRate(u32),

    #[error("chunk size mismatch: expected {expected} bytes, got {actual}")]
    ChunkSizeMismatch { expected: usize, actual: usize },

    #[error("transcription provider io error: {0}")]
    ProviderIo(String),

    #[error("transcription provider protocol error: {0}")]
    ProviderProtocol(String),

    #[error("transcription provider error {code}: {message}")]
    ProviderError { code: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("control channel closed")]
    ControlChannelClosed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
