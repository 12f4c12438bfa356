//! End-to-end tests wiring the segmenter and turn coordinator together
//! through fakes, covering the scenarios the unit tests within each module
//! don't reach on their own.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use vox_core::{
    CoreError, NoopDownstreamLlm, ProviderSink, Result, Segmenter, TranscriptionCallbacks,
    TurnCoordinator, TurnDetectionPolicy,
};

#[derive(Default)]
struct FakeProvider {
    appended: AtomicUsize,
    committed: AtomicUsize,
    fail_next_append: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl ProviderSink for FakeProvider {
    async fn append(&self, _chunk: &[u8]) -> Result<bool> {
        if self.fail_next_append.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        self.appended.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
    async fn commit(&self) -> Result<bool> {
        self.committed.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    async fn buffered_ms(&self) -> u64 {
        (self.appended.load(Ordering::SeqCst) as u64) * 20
    }
}

#[derive(Default)]
struct RecordingControl {
    messages: Mutex<Vec<Value>>,
}

#[async_trait]
impl vox_core::ControlChannel for RecordingControl {
    async fn send(&self, envelope: Value) {
        self.messages.lock().await.push(envelope);
    }
}

fn type_of(v: &Value) -> &str {
    v.get("type").and_then(Value::as_str).unwrap_or("")
}

#[tokio::test]
async fn back_to_back_utterances_produce_two_distinct_turns_in_local_mode() {
    let provider = Arc::new(FakeProvider::default());
    let control = Arc::new(RecordingControl::default());
    let coordinator = TurnCoordinator::new(
        TurnDetectionPolicy::Local,
        control.clone(),
        Arc::new(NoopDownstreamLlm),
    );
    coordinator.bind_self().await;

    let segmenter = Segmenter::new(
        3,
        30,
        10,
        provider.clone() as Arc<dyn ProviderSink>,
        coordinator.clone(),
    );

    // First utterance
    segmenter.process_chunk(vec![1u8; 960], true).await;
    segmenter.process_chunk(vec![1u8; 960], false).await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    coordinator.on_final("hello").await;

    // Second utterance
    segmenter.process_chunk(vec![1u8; 960], true).await;
    segmenter.process_chunk(vec![1u8; 960], false).await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    coordinator.on_final("world").await;

    let messages = control.messages.lock().await;
    let finals: Vec<&Value> = messages.iter().filter(|m| type_of(m) == "stt.final").collect();
    assert_eq!(finals.len(), 2);
    assert_eq!(finals[0]["text"], "hello");
    assert_eq!(finals[1]["text"], "world");
    assert_ne!(finals[0]["turn_id"], finals[1]["turn_id"]);
}

#[tokio::test]
async fn server_mode_final_timeout_synthesizes_inaudible_when_no_final_arrives() {
    let control = Arc::new(RecordingControl::default());
    let coordinator = TurnCoordinator::new(
        TurnDetectionPolicy::Server {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_ms: 500,
        },
        control.clone(),
        Arc::new(NoopDownstreamLlm),
    );
    coordinator.bind_self().await;

    coordinator.on_vad_boundary(true).await;
    coordinator.on_vad_boundary(false).await;

    // The real timeout is 2s; this test only checks that no premature final
    // fires and that the turn is still open right after speech_stopped.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let messages = control.messages.lock().await;
    assert!(!messages.iter().any(|m| type_of(m) == "stt.final"));
}

#[tokio::test]
async fn provider_disconnect_mid_segment_is_a_soft_failure_not_a_panic() {
    let provider = Arc::new(FakeProvider::default());
    provider.fail_next_append.store(true, Ordering::SeqCst);
    let control = Arc::new(RecordingControl::default());
    let coordinator = TurnCoordinator::new(
        TurnDetectionPolicy::Local,
        control.clone(),
        Arc::new(NoopDownstreamLlm),
    );
    coordinator.bind_self().await;
    let segmenter = Segmenter::new(3, 30, 10, provider.clone() as Arc<dyn ProviderSink>, coordinator);

    // First chunk's append fails (simulated disconnect); the segmenter must
    // not panic and must keep accepting subsequent chunks.
    segmenter.process_chunk(vec![1u8; 960], true).await;
    segmenter.process_chunk(vec![1u8; 960], true).await;
    segmenter.process_chunk(vec![1u8; 960], false).await;

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(provider.appended.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn chunk_size_mismatch_is_a_hard_error_from_the_provider_sink() {
    struct StrictSink;
    #[async_trait]
    impl ProviderSink for StrictSink {
        async fn append(&self, chunk: &[u8]) -> Result<bool> {
            if chunk.len() != vox_core::audio::CHUNK_BYTES {
                return Err(CoreError::ChunkSizeMismatch {
                    expected: vox_core::audio::CHUNK_BYTES,
                    actual: chunk.len(),
                });
            }
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

    let sink = StrictSink;
    let err = sink.append(&[0u8; 10]).await.unwrap_err();
    assert!(matches!(err, CoreError::ChunkSizeMismatch { .. }));
}
