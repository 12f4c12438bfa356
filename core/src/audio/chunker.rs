//! Component B: chunk accumulation.
//!
//! Buffers normalized mono PCM and emits fixed 20ms chunks in arrival order.
//! A 24kHz chunk is 480 samples (960 bytes); whatever doesn't divide evenly
//! stays buffered for the next push, so nothing is ever padded or dropped to
//! force alignment.

use std::collections::VecDeque;

pub const CHUNK_SAMPLES: usize = 480;
pub const CHUNK_BYTES: usize = CHUNK_SAMPLES * 2;

/// Samples-per-chunk for the companion 16kHz VAD view (320 samples, 20ms).
pub const VAD_CHUNK_SAMPLES: usize = 320;
pub const VAD_CHUNK_BYTES: usize = VAD_CHUNK_SAMPLES * 2;

#[derive(Default)]
pub struct ChunkAccumulator {
    buffer: VecDeque<i16>,
}

impl ChunkAccumulator {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::new(),
        }
    }

    /// Push newly normalized samples and drain as many complete chunks as
    /// are now available, in order.
    pub fn push(&mut self, samples: &[i16]) -> Vec<Vec<i16>> {
        self.buffer.extend(samples.iter().copied());
        let mut out = Vec::new();
        while self.buffer.len() >= CHUNK_SAMPLES {
            let chunk: Vec<i16> = self.buffer.drain(..CHUNK_SAMPLES).collect();
            out.push(chunk);
        }
        out
    }

    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

/// Serialize a chunk of i16 samples to little-endian bytes for the wire.
pub fn chunk_to_bytes(chunk: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(chunk.len() * 2);
    for &s in chunk {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_only_complete_chunks_in_order() {
        let mut acc = ChunkAccumulator::new();
        let samples: Vec<i16> = (0..1000).map(|i| i as i16).collect();
        let chunks = acc.push(&samples);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0][0], 0);
        assert_eq!(chunks[1][0], 480);
        assert_eq!(acc.pending_len(), 40);
    }

    #[test]
    fn partial_chunk_carries_over_across_pushes() {
        let mut acc = ChunkAccumulator::new();
        assert!(acc.push(&vec![0i16; 300]).is_empty());
        let chunks = acc.push(&vec![0i16; 200]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(acc.pending_len(), 20);
    }

    #[test]
    fn chunk_bytes_are_double_the_sample_count() {
        let chunk = vec![0i16; CHUNK_SAMPLES];
        assert_eq!(chunk_to_bytes(&chunk).len(), CHUNK_BYTES);
    }
}
