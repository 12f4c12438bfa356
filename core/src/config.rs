//! Ambient configuration.
//!
//! Env-var-driven defaults with clamping, matching the way the rest of this
//! stack's demo binaries configure themselves: each section has sane
//! built-in defaults so the pipeline runs with zero configuration beyond a
//! transcription API key, and every numeric knob is clamped to the range
//! it's actually safe to run with.

use std::path::PathBuf;

use crate::{CoreError, Result};

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    pub gain_db: f32,
    pub target_rate_hz: u32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            gain_db: env_f32("VOX_INPUT_GAIN_DB", 0.0),
            target_rate_hz: env_u64("VOX_TARGET_RATE_HZ", 24_000) as u32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Number of 20ms chunks kept as pre-roll, derived from `VOX_PRE_ROLL_MS`
    /// (default 300ms), floored at 10 chunks (200ms) regardless of the env
    /// value.
    pub pre_roll_chunks: usize,
    /// Silence duration before a segment closes, clamped to [300, 800]ms.
    pub hangover_ms: u64,
    /// Minimum buffered duration a commit will actually flush, in ms.
    pub min_commit_ms: u64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        let pre_roll_ms = env_u64("VOX_PRE_ROLL_MS", 300);
        let pre_roll_chunks = (((pre_roll_ms + 19) / 20) as usize).max(10);
        let hangover_ms = env_u64("VOX_HANGOVER_MS", 500).clamp(300, 800);
        let min_commit_ms = env_u64("VOX_MIN_COMMIT_MS", 100);
        Self {
            pre_roll_chunks,
            hangover_ms,
            min_commit_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TurnDetectionPolicy {
    Local,
    Server {
        threshold: f32,
        prefix_padding_ms: u64,
        silence_ms: u64,
    },
}

#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    pub provider_url: String,
    pub api_key: String,
    pub model_id: String,
    pub language: String,
    pub policy: TurnDetectionPolicy,
    pub min_commit_ms: u64,
}

impl TranscriptionConfig {
    /// Reads the required API key from `VOX_STT_API_KEY`; everything else
    /// has a default. Fails loudly at session setup rather than letting a
    /// missing key surface later as a cryptic connect failure.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("VOX_STT_API_KEY")
            .map_err(|_| CoreError::Config("VOX_STT_API_KEY is not set".into()))?;
        if api_key.trim().is_empty() {
            return Err(CoreError::Config("VOX_STT_API_KEY is empty".into()));
        }

        let provider_url = std::env::var("VOX_STT_PROVIDER_URL")
            .unwrap_or_else(|_| "wss://api.openai.com/v1/realtime".to_string());
        let model_id = std::env::var("VOX_STT_MODEL_ID")
            .unwrap_or_else(|_| "gpt-4o-realtime-preview".to_string());
        let language = std::env::var("VOX_STT_LANGUAGE").unwrap_or_else(|_| "en".to_string());

        let policy = match std::env::var("VOX_TURN_DETECTION").ok().as_deref() {
            Some("server") => TurnDetectionPolicy::Server {
                threshold: env_f32("VOX_SERVER_VAD_THRESHOLD", 0.6),
                prefix_padding_ms: env_u64("VOX_SERVER_VAD_PREFIX_PADDING_MS", 500),
                silence_ms: env_u64("VOX_SERVER_VAD_SILENCE_MS", 800),
            },
            _ => TurnDetectionPolicy::Local,
        };

        Ok(Self {
            provider_url,
            api_key,
            model_id,
            language,
            policy,
            min_commit_ms: env_u64("VOX_MIN_COMMIT_MS", 100),
        })
    }
}

#[derive(Debug, Clone)]
pub struct DevCaptureConfig {
    pub enabled: bool,
    pub output_dir: PathBuf,
}

impl Default for DevCaptureConfig {
    fn default() -> Self {
        Self {
            enabled: env_bool("VOX_DEV_CAPTURE_WAV", false),
            output_dir: std::env::var("VOX_DEV_CAPTURE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./captures")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub normalizer: NormalizerConfig,
    pub segmenter: SegmenterConfig,
    pub dev_capture: DevCaptureConfig,
}
