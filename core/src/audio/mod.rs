//! Ingest-side audio components: normalize (A), chunk (B), VAD-gate (C).

pub mod chunker;
pub mod frame;
pub mod normalizer;
pub mod vad;


pub use chunker::{ChunkAccumulator, CHUNK_BYTES, CHUNK_SAMPLES};
pub use frame::{InputFrame, SampleFormat};
pub use normalizer::normalize;
pub use vad::VadGate;
