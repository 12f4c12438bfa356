//! Component G: control channel.
//!
//! A thin, best-effort capability for pushing session-lifecycle and
//! transcription events (`vad.speech_started`, `stt.partial`, `stt.final`,
//! `stt.error`, ...) out to whoever is driving the session, and for
//! receiving a small set of inbound control messages (`mic.enabled`,
//! `mic.disabled`, `mic.toggle`) that gate the ingest path. Sends never
//! fail the caller: an implementation whose underlying channel isn't open
//! logs a warning and discards the envelope rather than returning an error
//! up through the segmenter or turn coordinator.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait ControlChannel: Send + Sync {
    async fn send(&self, envelope: Value);
}

/// A control channel with nowhere to send; used by callers that don't wire
/// up a real one (tests, a capture-only demo with no signaling peer).
pub struct NullControlChannel;

#[async_trait]
impl ControlChannel for NullControlChannel {
    async fn send(&self, envelope: Value) {
        tracing::debug!(?envelope, "control channel not open; discarding");
    }
}

/// The mic on/off flag inbound control messages flip. Read once per chunk on
/// the ingest path: chunks observed while disabled are dropped before ever
/// reaching the VAD gate, so a muted mic produces no segments, no provider
/// traffic and no turns.
pub struct MicGate {
    enabled: AtomicBool,
}

impl Default for MicGate {
    fn default() -> Self {
        Self::new()
    }
}

impl MicGate {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn toggle(&self) {
        self.enabled.fetch_xor(true, Ordering::AcqRel);
    }

    /// Apply an inbound control message type, if it's one of the mic
    /// gestures. Unrecognized types are ignored here; the session's own
    /// control-message dispatch may still act on them.
    pub fn apply(&self, message_type: &str) {
        match message_type {
            "mic.enabled" | "mic.on" => self.set(true),
            "mic.disabled" | "mic.off" => self.set(false),
            "mic.toggle" => self.toggle(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_enabled_and_toggles() {
        let gate = MicGate::new();
        assert!(gate.is_enabled());
        gate.apply("mic.disabled");
        assert!(!gate.is_enabled());
        gate.apply("mic.toggle");
        assert!(gate.is_enabled());
    }

    #[test]
    fn unrecognized_message_is_ignored() {
        let gate = MicGate::new();
        gate.apply("stt.partial");
        assert!(gate.is_enabled());
    }
}
