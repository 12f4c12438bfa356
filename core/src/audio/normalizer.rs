//! Component A: frame normalization.
//!
//! Every input frame, regardless of its native rate, channel layout or
//! sample format, is reduced to mono signed-16 PCM at a target rate through
//! one fixed pipeline: downmix, format conversion to float with clipping,
//! gain, rational resample, quantize. The four supported sample formats are
//! closed over by [`crate::audio::frame::SampleFormat`], so there is no
//! "unrecognized format" branch to fall back on.

use crate::audio::frame::{downmix, InputFrame, SampleFormat};
use crate::{CoreError, Result};

/// Rates the rest of the pipeline is allowed to target or receive.
pub const SUPPORTED_RATES: [u32; 3] = [16_000, 24_000, 48_000];

pub fn validate_rate(hz: u32) -> Result<()> {
    if SUPPORTED_RATES.contains(&hz) {
        Ok(())
    } else {
        Err(CoreError::UnsupportedSampleRate(hz))
    }
}

/// Normalize `frame` to mono i16 PCM at `target_hz`, applying `gain_db` of
/// gain before resampling. Returns an error only for a rate the pipeline
/// doesn't recognize; callers are expected to log once and drop the frame
/// rather than propagate that upward as a hard failure.
pub fn normalize(frame: &InputFrame, target_hz: u32, gain_db: f32) -> Result<Vec<i16>> {
    validate_rate(frame.rate_hz())?;
    validate_rate(target_hz)?;

    let (rate_hz, mono) = match frame.clone() {
        InputFrame::Mono { rate_hz, samples } => (rate_hz, samples),
        InputFrame::Interleaved {
            rate_hz,
            channels,
            samples,
        } => (rate_hz, downmix(samples, channels)),
    };

    let mut floats = to_float(mono);
    clip_in_place(&mut floats);

    if gain_db != 0.0 {
        let gain = 10f32.powf(gain_db / 20.0);
        for s in floats.iter_mut() {
            *s *= gain;
        }
        clip_in_place(&mut floats);
    }

    let resampled = resample(&floats, rate_hz, target_hz);
    Ok(quantize(&resampled))
}

/// Step 2: convert the native format to float. i16 and i32 are divided by
/// their full-scale magnitude and never rescaled by peak — a quiet i16
/// recording stays quiet. Floats are assumed already in [-1, 1] and are
/// clipped, not rescaled.
fn to_float(format: SampleFormat) -> Vec<f32> {
    match format {
        SampleFormat::I16(v) => v.iter().map(|&s| s as f32 / 32768.0).collect(),
        SampleFormat::I32(v) => v
            .iter()
            .map(|&s| (s as f64 / 2147483648.0_f64) as f32)
            .collect(),
        SampleFormat::F32(v) => v,
        SampleFormat::F64(v) => v.iter().map(|&s| s as f32).collect(),
    }
}

fn clip_in_place(samples: &mut [f32]) {
    for s in samples.iter_mut() {
        *s = s.clamp(-1.0, 1.0);
    }
}

/// Step 4: rational resample with the rate ratio reduced by gcd, matching a
/// polyphase's up/down indexing, with linear interpolation standing in for a
/// full sinc-interpolated filter bank. Speech-rate conversions between
/// 16/24/48kHz don't need more than that for VAD- and transcription-grade
/// fidelity, and it avoids pulling in a dedicated DSP crate for three fixed
/// rates.
pub(crate) fn resample(input: &[f32], from_hz: u32, to_hz: u32) -> Vec<f32> {
    if from_hz == to_hz || input.is_empty() {
        return input.to_vec();
    }
    let g = gcd(from_hz, to_hz);
    let up = (to_hz / g) as usize;
    let down = (from_hz / g) as usize;
    let out_len = (input.len() * up) / down;

    let mut out = Vec::with_capacity(out_len);
    for n in 0..out_len {
        let virtual_idx = n * down;
        let src_pos = virtual_idx as f64 / up as f64;
        let idx = src_pos.floor() as usize;
        let frac = src_pos - idx as f64;
        let s0 = input.get(idx).copied().unwrap_or(0.0) as f64;
        let s1 = input.get(idx + 1).copied().unwrap_or(s0 as f32) as f64;
        out.push((s0 + (s1 - s0) * frac) as f32);
    }
    out
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Step 5: clip and quantize to signed 16-bit.
fn quantize(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i16_passthrough_at_same_rate_is_lossless_within_rounding() {
        let frame = InputFrame::Mono {
            rate_hz: 24_000,
            samples: SampleFormat::I16(vec![0, 1000, -1000, 32767, -32768]),
        };
        let out = normalize(&frame, 24_000, 0.0).unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], 0);
    }

    #[test]
    fn stereo_downmix_averages_channels() {
        let frame = InputFrame::Interleaved {
            rate_hz: 24_000,
            channels: 2,
            samples: SampleFormat::I16(vec![1000, -1000, 2000, 2000]),
        };
        let out = normalize(&frame, 24_000, 0.0).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 2000);
    }

    #[test]
    fn resample_48k_to_24k_halves_sample_count() {
        let input: Vec<f32> = (0..480).map(|i| (i as f32 / 480.0).sin()).collect();
        let out = resample(&input, 48_000, 24_000);
        assert_eq!(out.len(), 240);
    }

    #[test]
    fn unsupported_rate_is_rejected() {
        let frame = InputFrame::Mono {
            rate_hz: 44_100,
            samples: SampleFormat::I16(vec![0; 10]),
        };
        assert!(normalize(&frame, 24_000, 0.0).is_err());
    }

    #[test]
    fn gain_is_applied_before_clipping() {
        let frame = InputFrame::Mono {
            rate_hz: 24_000,
            samples: SampleFormat::F32(vec![0.9, -0.9]),
        };
        let out = normalize(&frame, 24_000, 6.0).unwrap();
        assert_eq!(out[0], 32767);
        assert_eq!(out[1], -32767);
    }
}
