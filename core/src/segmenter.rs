//! Component D: segmentation.
//!
//! A three-state machine (idle / speech / hangover) sitting between the VAD
//! gate and the transcription provider. It owns the pre-roll ring, opens and
//! closes segments, and is the single place the append/commit/clear protocol
//! is driven from. One segmenter lock serializes every state transition and
//! every provider call that transition makes, so a hangover expiry's
//! commit+clear can never interleave with the next segment's first append.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::Result;

/// Capability the segmenter drives. A single object folding append, commit,
/// clear and buffered-duration query, rather than four separate callbacks
/// threaded through the pipeline independently — the transcription client
/// implements this directly.
#[async_trait]
pub trait ProviderSink: Send + Sync {
    /// Send one 20ms chunk. Returns `Ok(false)` for a soft failure (socket
    /// not connected / already closed) that the segmenter should treat as a
    /// dropped chunk rather than a fatal error.
    async fn append(&self, chunk: &[u8]) -> Result<bool>;
    /// Returns `Ok(false)` if the commit was refused (buffer too short /
    /// appends still in flight).
    async fn commit(&self) -> Result<bool>;
    async fn clear(&self) -> Result<()>;
    async fn buffered_ms(&self) -> u64;
}

/// Observer notified of segment boundaries. Used by the local-VAD turn
/// coordinator variant; both methods default to no-ops so a caller that only
/// cares about one can skip the other.
#[async_trait]
pub trait SegmenterObserver: Send + Sync {
    async fn on_segment_open(&self, _segment_id: u64) {}
    async fn on_segment_commit(&self, _segment_id: u64, _buffered_ms: u64) {}
}

pub struct NoopObserver;

#[async_trait]
impl SegmenterObserver for NoopObserver {
    async fn on_segment_open(&self, _segment_id: u64) {}
    async fn on_segment_commit(&self, _segment_id: u64, _buffered_ms: u64) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Speech,
    Hangover,
}

#[derive(Debug, Clone)]
pub struct Segment {
    pub id: u64,
    pub opened_at: DateTime<Utc>,
    pub appended_chunks: usize,
}

struct Inner {
    state: State,
    pre_roll: VecDeque<Vec<u8>>,
    pre_roll_cap: usize,
    next_segment_id: u64,
    current: Option<Segment>,
    hangover_handle: Option<JoinHandle<()>>,
}

pub struct Segmenter {
    inner: Arc<Mutex<Inner>>,
    provider: Arc<dyn ProviderSink>,
    observer: Arc<dyn SegmenterObserver>,
    hangover_ms: u64,
    min_commit_ms: u64,
}

impl Segmenter {
    pub fn new(
        pre_roll_chunks: usize,
        hangover_ms: u64,
        min_commit_ms: u64,
        provider: Arc<dyn ProviderSink>,
        observer: Arc<dyn SegmenterObserver>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: State::Idle,
                pre_roll: VecDeque::with_capacity(pre_roll_chunks),
                pre_roll_cap: pre_roll_chunks.max(1),
                next_segment_id: 1,
                current: None,
                hangover_handle: None,
            })),
            provider,
            observer,
            hangover_ms,
            min_commit_ms,
        }
    }

    /// Feed one 20ms chunk (already chunk-sized bytes) through the state
    /// machine, given the VAD gate's verdict for it.
    pub async fn process_chunk(&self, chunk: Vec<u8>, is_speech: bool) {
        let mut guard = self.inner.lock().await;
        match (guard.state, is_speech) {
            (State::Idle, false) => {
                guard.pre_roll.push_back(chunk);
                while guard.pre_roll.len() > guard.pre_roll_cap {
                    guard.pre_roll.pop_front();
                }
            }
            (State::Idle, true) => {
                let id = guard.next_segment_id;
                guard.next_segment_id += 1;
                let preroll: Vec<Vec<u8>> = guard.pre_roll.drain(..).collect();
                guard.state = State::Speech;
                guard.current = Some(Segment {
                    id,
                    opened_at: Utc::now(),
                    appended_chunks: 0,
                });

                let mut appended = 0usize;
                for c in preroll {
                    if self.provider.append(&c).await.unwrap_or(false) {
                        appended += 1;
                    }
                }
                if self.provider.append(&chunk).await.unwrap_or(false) {
                    appended += 1;
                }
                if let Some(seg) = guard.current.as_mut() {
                    seg.appended_chunks += appended;
                }
                drop(guard);
                self.observer.on_segment_open(id).await;
            }
            (State::Speech, true) => {
                if self.provider.append(&chunk).await.unwrap_or(false) {
                    if let Some(seg) = guard.current.as_mut() {
                        seg.appended_chunks += 1;
                    }
                }
            }
            (State::Speech, false) => {
                if self.provider.append(&chunk).await.unwrap_or(false) {
                    if let Some(seg) = guard.current.as_mut() {
                        seg.appended_chunks += 1;
                    }
                }
                guard.state = State::Hangover;
                let handle = self.spawn_hangover();
                guard.hangover_handle = Some(handle);
            }
            (State::Hangover, true) => {
                if self.provider.append(&chunk).await.unwrap_or(false) {
                    if let Some(seg) = guard.current.as_mut() {
                        seg.appended_chunks += 1;
                    }
                }
                if let Some(h) = guard.hangover_handle.take() {
                    h.abort();
                }
                guard.state = State::Speech;
            }
            (State::Hangover, false) => {
                // Timer already running from the first silence chunk; it is
                // not restarted by further silence.
                if self.provider.append(&chunk).await.unwrap_or(false) {
                    if let Some(seg) = guard.current.as_mut() {
                        seg.appended_chunks += 1;
                    }
                }
            }
        }
    }

    fn spawn_hangover(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let provider = Arc::clone(&self.provider);
        let observer = Arc::clone(&self.observer);
        let hangover_ms = self.hangover_ms;
        let min_commit_ms = self.min_commit_ms;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(hangover_ms)).await;
            let mut guard = inner.lock().await;
            if guard.state != State::Hangover {
                return;
            }
            let buffered = provider.buffered_ms().await;
            if buffered >= min_commit_ms {
                let _ = provider.commit().await;
            }
            let _ = provider.clear().await;

            let segment = guard.current.take();
            guard.state = State::Idle;
            guard.hangover_handle = None;
            drop(guard);

            if let Some(seg) = segment {
                observer.on_segment_commit(seg.id, buffered).await;
            }
        })
    }

    /// Cancel any in-flight hangover timer. Used on session teardown.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        if let Some(h) = guard.hangover_handle.take() {
            h.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as TokioMutex;

    #[derive(Default)]
    struct FakeProvider {
        appended: AtomicUsize,
        committed: AtomicUsize,
        cleared: AtomicUsize,
        log: TokioMutex<Vec<String>>,
    }

    #[async_trait]
    impl ProviderSink for FakeProvider {
        async fn append(&self, _chunk: &[u8]) -> Result<bool> {
            self.appended.fetch_add(1, Ordering::SeqCst);
            self.log.lock().await.push("append".into());
            Ok(true)
        }
        async fn commit(&self) -> Result<bool> {
            self.committed.fetch_add(1, Ordering::SeqCst);
            self.log.lock().await.push("commit".into());
            Ok(true)
        }
        async fn clear(&self) -> Result<()> {
            self.cleared.fetch_add(1, Ordering::SeqCst);
            self.log.lock().await.push("clear".into());
            Ok(())
        }
        async fn buffered_ms(&self) -> u64 {
            (self.appended.load(Ordering::SeqCst) as u64) * 20
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        opens: AtomicUsize,
        commits: AtomicUsize,
    }

    #[async_trait]
    impl SegmenterObserver for RecordingObserver {
        async fn on_segment_open(&self, _segment_id: u64) {
            self.opens.fetch_add(1, Ordering::SeqCst);
        }
        async fn on_segment_commit(&self, _segment_id: u64, _buffered_ms: u64) {
            self.commits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn one_word_then_silence_drains_preroll_and_commits_after_hangover() {
        let provider = Arc::new(FakeProvider::default());
        let observer = Arc::new(RecordingObserver::default());
        let segmenter = Segmenter::new(
            5,
            50,
            20,
            provider.clone() as Arc<dyn ProviderSink>,
            observer.clone() as Arc<dyn SegmenterObserver>,
        );

        for _ in 0..3 {
            segmenter.process_chunk(vec![0u8; 960], false).await;
        }
        segmenter.process_chunk(vec![1u8; 960], true).await;
        segmenter.process_chunk(vec![1u8; 960], false).await;

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(observer.opens.load(Ordering::SeqCst), 1);
        assert_eq!(observer.commits.load(Ordering::SeqCst), 1);
        assert_eq!(provider.committed.load(Ordering::SeqCst), 1);
        assert_eq!(provider.cleared.load(Ordering::SeqCst), 1);
        // 3 preroll chunks + 1 speech + 1 trailing silence chunk
        assert_eq!(provider.appended.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn speech_resuming_during_hangover_cancels_the_timer_without_a_new_segment() {
        let provider = Arc::new(FakeProvider::default());
        let observer = Arc::new(RecordingObserver::default());
        let segmenter = Segmenter::new(
            5,
            50,
            20,
            provider.clone() as Arc<dyn ProviderSink>,
            observer.clone() as Arc<dyn SegmenterObserver>,
        );

        segmenter.process_chunk(vec![1u8; 960], true).await;
        segmenter.process_chunk(vec![1u8; 960], false).await;
        segmenter.process_chunk(vec![1u8; 960], true).await;

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(observer.opens.load(Ordering::SeqCst), 1);
        assert_eq!(observer.commits.load(Ordering::SeqCst), 0);
        assert_eq!(provider.committed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn short_buffer_on_hangover_expiry_clears_without_committing() {
        let provider = Arc::new(FakeProvider::default());
        let observer = Arc::new(RecordingObserver::default());
        let segmenter = Segmenter::new(
            5,
            30,
            1000,
            provider.clone() as Arc<dyn ProviderSink>,
            observer.clone() as Arc<dyn SegmenterObserver>,
        );

        segmenter.process_chunk(vec![1u8; 960], true).await;
        segmenter.process_chunk(vec![1u8; 960], false).await;

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(provider.committed.load(Ordering::SeqCst), 0);
        assert_eq!(provider.cleared.load(Ordering::SeqCst), 1);
        assert_eq!(observer.commits.load(Ordering::SeqCst), 1);
    }
}
