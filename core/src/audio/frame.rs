//! Tagged input-frame types.
//!
//! Upstream capture/decoders (cpal, an RTP depacketizer, a file reader) each
//! know their own sample rate, channel layout and sample format; nothing
//! downstream needs to guess at shape by inspecting a buffer. A frame is
//! always one of these two layouts, carrying its format as a closed enum, so
//! the normalizer never hits an unrecognized shape or format at runtime.

/// Raw sample storage, tagged by the four formats a capture source can hand
/// us. There is deliberately no "other" variant: anything not in this set is
/// a bug in the caller, not a case the normalizer has to cope with.
#[derive(Debug, Clone)]
pub enum SampleFormat {
    I16(Vec<i16>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl SampleFormat {
    pub fn len(&self) -> usize {
        match self {
            SampleFormat::I16(v) => v.len(),
            SampleFormat::I32(v) => v.len(),
            SampleFormat::F32(v) => v.len(),
            SampleFormat::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A frame of audio as handed to the normalizer.
///
/// `Mono` passes straight through the format-conversion step. `Interleaved`
/// carries a channel count and is downmixed to mono (averaging across
/// channels, in the native numeric domain of the format) before format
/// conversion runs.
#[derive(Debug, Clone)]
pub enum InputFrame {
    Mono {
        rate_hz: u32,
        samples: SampleFormat,
    },
    Interleaved {
        rate_hz: u32,
        channels: u16,
        samples: SampleFormat,
    },
}

impl InputFrame {
    pub fn rate_hz(&self) -> u32 {
        match self {
            InputFrame::Mono { rate_hz, .. } => *rate_hz,
            InputFrame::Interleaved { rate_hz, .. } => *rate_hz,
        }
    }
}

/// Downmix an interleaved multi-channel buffer to mono, averaging in the
/// accumulator type appropriate to the sample format so integer formats
/// don't round-trip through floats unnecessarily.
pub(crate) fn downmix(format: SampleFormat, channels: u16) -> SampleFormat {
    let ch = channels as usize;
    if ch <= 1 {
        return format;
    }
    match format {
        SampleFormat::I16(v) => {
            let mut out = Vec::with_capacity(v.len() / ch);
            for frame in v.chunks(ch) {
                let acc: i32 = frame.iter().map(|&s| s as i32).sum();
                out.push((acc / ch as i32) as i16);
            }
            SampleFormat::I16(out)
        }
        SampleFormat::I32(v) => {
            let mut out = Vec::with_capacity(v.len() / ch);
            for frame in v.chunks(ch) {
                let acc: i64 = frame.iter().map(|&s| s as i64).sum();
                out.push((acc / ch as i64) as i32);
            }
            SampleFormat::I32(out)
        }
        SampleFormat::F32(v) => {
            let mut out = Vec::with_capacity(v.len() / ch);
            for frame in v.chunks(ch) {
                let acc: f32 = frame.iter().sum();
                out.push(acc / ch as f32);
            }
            SampleFormat::F32(out)
        }
        SampleFormat::F64(v) => {
            let mut out = Vec::with_capacity(v.len() / ch);
            for frame in v.chunks(ch) {
                let acc: f64 = frame.iter().sum();
                out.push(acc / ch as f64);
            }
            SampleFormat::F64(out)
        }
    }
}
