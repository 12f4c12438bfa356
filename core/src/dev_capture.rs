//! Developer capture dump: one WAV file per committed segment.
//!
//! Wraps a [`ProviderSink`] and mirrors every byte that successfully reaches
//! the real provider into an in-memory buffer, flushing it to disk as a
//! standard PCM WAV file on commit (and discarding it on clear). A single
//! `VOX_DEV_CAPTURE_WAV` flag guards the whole thing; when it's off this is
//! a pure passthrough with no extra allocation on the hot path.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;

use crate::audio::chunker::CHUNK_BYTES;
use crate::segmenter::ProviderSink;
use crate::Result;

pub struct DevCaptureSink<P: ProviderSink> {
    inner: Arc<P>,
    enabled: bool,
    output_dir: PathBuf,
    sample_rate_hz: u32,
    buffer: AsyncMutex<Vec<u8>>,
    segment_counter: AtomicUsize,
}

impl<P: ProviderSink> DevCaptureSink<P> {
    pub fn new(inner: Arc<P>, enabled: bool, output_dir: PathBuf, sample_rate_hz: u32) -> Self {
        Self {
            inner,
            enabled,
            output_dir,
            sample_rate_hz,
            buffer: AsyncMutex::new(Vec::new()),
            segment_counter: AtomicUsize::new(0),
        }
    }

    async fn flush_wav(&self) {
        let bytes = {
            let mut guard = self.buffer.lock().await;
            std::mem::take(&mut *guard)
        };
        if bytes.is_empty() {
            return;
        }
        let samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        let idx = self.segment_counter.fetch_add(1, Ordering::SeqCst);
        let path = self.output_dir.join(format!("segment-{idx:06}.wav"));
        let rate = self.sample_rate_hz;
        if let Err(e) = write_wav_file(&path, &samples, rate, 1) {
            tracing::warn!(error = %e, path = %path.display(), "failed to write dev capture WAV file");
        }
    }
}

#[async_trait]
impl<P: ProviderSink> ProviderSink for DevCaptureSink<P> {
    async fn append(&self, chunk: &[u8]) -> Result<bool> {
        let ok = self.inner.append(chunk).await?;
        if ok && self.enabled {
            debug_assert_eq!(chunk.len(), CHUNK_BYTES);
            self.buffer.lock().await.extend_from_slice(chunk);
        }
        Ok(ok)
    }

    async fn commit(&self) -> Result<bool> {
        let ok = self.inner.commit().await?;
        if ok && self.enabled {
            self.flush_wav().await;
        }
        Ok(ok)
    }

    async fn clear(&self) -> Result<()> {
        self.inner.clear().await?;
        if self.enabled {
            self.buffer.lock().await.clear();
        }
        Ok(())
    }

    async fn buffered_ms(&self) -> u64 {
        self.inner.buffered_ms().await
    }
}

fn write_wav_file(path: &Path, samples: &[i16], sample_rate: u32, channels: u16) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;

    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = (samples.len() * 2) as u32;
    let file_size = 36 + data_size;

    file.write_all(b"RIFF")?;
    file.write_all(&file_size.to_le_bytes())?;
    file.write_all(b"WAVE")?;

    file.write_all(b"fmt ")?;
    file.write_all(&16u32.to_le_bytes())?;
    file.write_all(&1u16.to_le_bytes())?;
    file.write_all(&channels.to_le_bytes())?;
    file.write_all(&sample_rate.to_le_bytes())?;
    file.write_all(&byte_rate.to_le_bytes())?;
    file.write_all(&block_align.to_le_bytes())?;
    file.write_all(&bits_per_sample.to_le_bytes())?;

    file.write_all(b"data")?;
    file.write_all(&data_size.to_le_bytes())?;
    for &sample in samples {
        file.write_all(&sample.to_le_bytes())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as Counter;

    struct FakeSink {
        appended: Counter,
    }

    #[async_trait]
    impl ProviderSink for FakeSink {
        async fn append(&self, _chunk: &[u8]) -> Result<bool> {
            self.appended.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
        async fn commit(&self) -> Result<bool> {
            Ok(true)
        }
        async fn clear(&self) -> Result<()> {
            Ok(())
        }
        async fn buffered_ms(&self) -> u64 {
            0
        }
    }

    #[tokio::test]
    async fn disabled_capture_never_allocates_a_file() {
        let dir = std::env::temp_dir().join("vox-core-dev-capture-test-disabled");
        let sink = DevCaptureSink::new(
            Arc::new(FakeSink {
                appended: Counter::new(0),
            }),
            false,
            dir.clone(),
            24_000,
        );
        sink.append(&vec![0u8; CHUNK_BYTES]).await.unwrap();
        sink.commit().await.unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn enabled_capture_writes_one_wav_per_commit() {
        let dir = std::env::temp_dir().join(format!(
            "vox-core-dev-capture-test-{}",
            std::process::id()
        ));
        let sink = DevCaptureSink::new(
            Arc::new(FakeSink {
                appended: Counter::new(0),
            }),
            true,
            dir.clone(),
            24_000,
        );
        sink.append(&vec![0u8; CHUNK_BYTES]).await.unwrap();
        sink.commit().await.unwrap();
        let written = dir.join("segment-000000.wav");
        assert!(written.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
