//! Demo configuration: environment defaults with an optional TOML overlay.
//!
//! Follows the same `Config::load()` idiom the rest of this stack's demo
//! binaries use: every field has a built-in default (itself often read from
//! an env var), and a `VOICE_AGENT_CONFIG` env var may name a TOML file whose
//! present fields override those defaults. A missing or unparsable overlay
//! file is not an error — the demo falls back to defaults and logs a
//! warning, since this binary is a dev convenience, not the production
//! signaling surface.

use serde::Deserialize;

use vox_capture::MicConfig;

#[derive(Clone, Debug)]
pub struct VoiceAgentConfig {
    /// Address the `vox-gateway` HTTP/WebSocket surface binds to.
    pub gateway_addr: String,
    /// Whether to also start a local-microphone ingest session, for manual
    /// testing without a browser/WebRTC client driving the gateway.
    pub local_mic_enabled: bool,
    pub mic: MicConfig,
}

impl Default for VoiceAgentConfig {
    fn default() -> Self {
        Self {
            gateway_addr: std::env::var("VOX_GATEWAY_ADDR").unwrap_or_else(|_| "0.0.0.0:8088".into()),
            local_mic_enabled: std::env::var("VOX_DEMO_LOCAL_MIC")
                .ok()
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            mic: MicConfig::default(),
        }
    }
}

/// Mirrors [`VoiceAgentConfig`] with every field optional, for deserializing
/// a partial TOML overlay.
#[derive(Deserialize, Default)]
struct ConfigFile {
    gateway_addr: Option<String>,
    local_mic_enabled: Option<bool>,
    mic: Option<MicFile>,
}

#[derive(Deserialize, Default)]
struct MicFile {
    sample_rate_hz: Option<u32>,
    channels: Option<u16>,
    chunk_ms: Option<u32>,
    device_name: Option<String>,
}

impl VoiceAgentConfig {
    /// Build the env-default config, then apply a TOML overlay named by
    /// `VOICE_AGENT_CONFIG`, if set and readable.
    pub fn load() -> Self {
        let mut cfg = Self::default();

        let Ok(path) = std::env::var("VOICE_AGENT_CONFIG") else {
            return cfg;
        };
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "could not read VOICE_AGENT_CONFIG overlay, using defaults");
                return cfg;
            }
        };
        let overlay: ConfigFile = match toml::from_str(&contents) {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "could not parse VOICE_AGENT_CONFIG overlay, using defaults");
                return cfg;
            }
        };

        if let Some(v) = overlay.gateway_addr {
            cfg.gateway_addr = v;
        }
        if let Some(v) = overlay.local_mic_enabled {
            cfg.local_mic_enabled = v;
        }
        if let Some(mic) = overlay.mic {
            if let Some(v) = mic.sample_rate_hz {
                cfg.mic.sample_rate_hz = v;
            }
            if let Some(v) = mic.channels {
                cfg.mic.channels = v;
            }
            if let Some(v) = mic.chunk_ms {
                cfg.mic.chunk_ms = v;
            }
            if mic.device_name.is_some() {
                cfg.mic.device_name = mic.device_name;
            }
        }

        cfg
    }
}
