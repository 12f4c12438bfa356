//! Optional local microphone capture.
//!
//! Not part of the core ingest pipeline — a convenience source for the demo
//! binary and for manual testing. It owns the `cpal` input stream and hands
//! each captured frame to the caller as a [`vox_core::audio::InputFrame`];
//! the caller is responsible for feeding those into an `IngestSession`.

mod mic;

pub use mic::{MicConfig, MicSource};
