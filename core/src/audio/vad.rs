//! Component C: VAD gate.
//!
//! Wraps `webrtc-vad` fixed at aggressive mode, 16kHz. The gate never sees
//! the main 24kHz path directly: for every 480-sample chunk handed in it
//! resamples its own 320-sample 16kHz view, matching the data model's
//! "companion VAD chunk" rather than re-deriving it from the original frame.
//! A single `VadGate` is not `Sync` (the underlying detector holds mutable
//! state per call) and is meant to be owned by one ingest task per session.

use webrtc_vad::{SampleRate, Vad, VadMode};

use crate::audio::chunker::CHUNK_SAMPLES;
use crate::audio::normalizer::resample;
use crate::Result;

pub struct VadGate {
    vad: Vad,
}

impl VadGate {
    pub fn new() -> Result<Self> {
        let mut vad = Vad::new();
        vad.set_mode(VadMode::Aggressive);
        let _ = vad.set_sample_rate(SampleRate::Rate16kHz);
        Ok(Self { vad })
    }

    /// Classify a 480-sample 24kHz chunk as voiced or not. Errors from the
    /// underlying detector (e.g. a malformed frame length) are treated as
    /// "not speech" rather than propagated, matching the gate's role as a
    /// soft classifier feeding the segmenter.
    pub fn is_speech(&mut self, chunk24k: &[i16]) -> bool {
        if chunk24k.len() != CHUNK_SAMPLES {
            return false;
        }
        let floats: Vec<f32> = chunk24k.iter().map(|&s| s as f32 / 32768.0).collect();
        let resampled = resample(&floats, 24_000, 16_000);
        let vad_chunk: Vec<i16> = resampled
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16)
            .collect();

        match self.vad.is_voice_segment(&vad_chunk) {
            Ok(voiced) => voiced,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_never_classified_as_speech() {
        let mut gate = VadGate::new().unwrap();
        let silence = vec![0i16; CHUNK_SAMPLES];
        assert!(!gate.is_speech(&silence));
    }

    #[test]
    fn wrong_length_chunk_is_rejected_as_not_speech() {
        let mut gate = VadGate::new().unwrap();
        assert!(!gate.is_speech(&[0i16; 10]));
    }
}
