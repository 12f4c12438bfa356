//! Component F: turn coordinator.
//!
//! Assembles provider transcripts into discrete conversational turns. Two
//! turn-detection policies are unified behind one coordinator:
//!
//! - **Local**: the segmenter's own VAD-driven commit is the turn boundary.
//!   A turn opens (`awaiting_final`) the moment a segment commits; the next
//!   provider final closes it.
//! - **Server**: the provider's own `speech_started` / `speech_stopped`
//!   events are the turn boundary; a 2 second final-timeout synthesizes
//!   `"[inaudible]"` if the provider never sends a final.
//!
//! The segmenter keeps framing audio (append/commit/clear) identically in
//! both policies — only which signal the coordinator listens to for turn
//! bookkeeping changes. See DESIGN.md for why that's the resolution to the
//! local-vs-server double-commit open question.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::TurnDetectionPolicy;
use crate::control::ControlChannel;
use crate::segmenter::SegmenterObserver;
use crate::stt::client::TranscriptionCallbacks;

const FINAL_TIMEOUT: Duration = Duration::from_millis(2000);
const INAUDIBLE: &str = "[inaudible]";

#[async_trait]
pub trait DownstreamLlm: Send + Sync {
    async fn handle_transcript(&self, turn_id: u64, transcript: &str);
}

pub struct NoopDownstreamLlm;

#[async_trait]
impl DownstreamLlm for NoopDownstreamLlm {
    async fn handle_transcript(&self, _turn_id: u64, _transcript: &str) {}
}

struct ActiveTurn {
    id: u64,
    partial: String,
    awaiting_final: bool,
    timeout_handle: Option<JoinHandle<()>>,
}

struct State {
    next_id: u64,
    turn: Option<ActiveTurn>,
}

pub struct TurnCoordinator {
    state: Mutex<State>,
    control: Arc<dyn ControlChannel>,
    downstream: Arc<dyn DownstreamLlm>,
    policy: TurnDetectionPolicy,
    self_ref: Mutex<Weak<TurnCoordinator>>,
}

impl TurnCoordinator {
    pub fn new(
        policy: TurnDetectionPolicy,
        control: Arc<dyn ControlChannel>,
        downstream: Arc<dyn DownstreamLlm>,
    ) -> Arc<Self> {
        let coordinator = Arc::new(Self {
            state: Mutex::new(State { next_id: 1, turn: None }),
            control,
            downstream,
            policy,
            self_ref: Mutex::new(Weak::new()),
        });
        coordinator
    }

    /// Must be called once after construction so the final-timeout task can
    /// reach back into the coordinator without holding it alive — a `Weak`
    /// reference, upgraded only while the task actually runs, so the cycle
    /// never outlives the `Arc`s session.rs holds.
    pub async fn bind_self(self: &Arc<Self>) {
        *self.self_ref.lock().await = Arc::downgrade(self);
    }

    async fn open_turn(&self) -> u64 {
        let mut guard = self.state.lock().await;
        if let Some(turn) = guard.turn.take() {
            if let Some(h) = turn.timeout_handle {
                h.abort();
            }
        }
        let id = guard.next_id;
        guard.next_id += 1;
        guard.turn = Some(ActiveTurn {
            id,
            partial: String::new(),
            awaiting_final: false,
            timeout_handle: None,
        });
        id
    }

    async fn begin_awaiting_final(&self, spawn_timeout: bool) {
        let mut guard = self.state.lock().await;
        let Some(turn) = guard.turn.as_mut() else {
            return;
        };
        turn.awaiting_final = true;
        if spawn_timeout {
            let turn_id = turn.id;
            let weak = self.self_ref.lock().await.clone();
            turn.timeout_handle = Some(tokio::spawn(async move {
                tokio::time::sleep(FINAL_TIMEOUT).await;
                if let Some(coordinator) = weak.upgrade() {
                    coordinator.finalize_on_timeout(turn_id).await;
                }
            }));
        }
    }

    async fn finalize_on_timeout(&self, turn_id: u64) {
        let mut guard = self.state.lock().await;
        let still_awaiting = matches!(
            &guard.turn,
            Some(t) if t.id == turn_id && t.awaiting_final
        );
        if !still_awaiting {
            return;
        }
        let turn = guard.turn.take().unwrap();
        drop(guard);

        let transcript = if turn.partial.trim().is_empty() {
            INAUDIBLE.to_string()
        } else {
            turn.partial.clone()
        };
        self.emit_final(turn.id, &transcript).await;
    }

    async fn emit_final(&self, turn_id: u64, transcript: &str) {
        self.control
            .send(json!({"type": "stt.final", "turn_id": turn_id, "text": transcript}))
            .await;
        self.downstream.handle_transcript(turn_id, transcript).await;
    }
}

#[async_trait]
impl SegmenterObserver for TurnCoordinator {
    async fn on_segment_open(&self, _segment_id: u64) {
        if matches!(self.policy, TurnDetectionPolicy::Local) {
            self.control.send(json!({"type": "vad.speech_started"})).await;
        }
    }

    async fn on_segment_commit(&self, _segment_id: u64, _buffered_ms: u64) {
        if matches!(self.policy, TurnDetectionPolicy::Local) {
            self.control.send(json!({"type": "vad.speech_stopped"})).await;
            self.open_turn().await;
            self.begin_awaiting_final(false).await;
        }
    }
}

#[async_trait]
impl TranscriptionCallbacks for TurnCoordinator {
    async fn on_partial(&self, delta: &str) {
        let mut guard = self.state.lock().await;
        let Some(turn) = guard.turn.as_mut() else {
            return;
        };
        turn.partial.push_str(delta);
        let (turn_id, running) = (turn.id, turn.partial.clone());
        drop(guard);
        self.control
            .send(json!({"type": "stt.partial", "turn_id": turn_id, "delta": delta, "text": running}))
            .await;
    }

    async fn on_final(&self, transcript: &str) {
        let mut guard = self.state.lock().await;
        let Some(turn) = guard.turn.as_ref() else {
            return;
        };
        if !turn.awaiting_final {
            return;
        }
        let turn = guard.turn.take().unwrap();
        if let Some(h) = turn.timeout_handle {
            h.abort();
        }
        drop(guard);

        let final_text = if transcript.trim().is_empty() {
            turn.partial.clone()
        } else {
            transcript.to_string()
        };
        self.emit_final(turn.id, &final_text).await;
    }

    async fn on_vad_boundary(&self, started: bool) {
        if !matches!(self.policy, TurnDetectionPolicy::Server { .. }) {
            return;
        }
        if started {
            let id = self.open_turn().await;
            self.control
                .send(json!({"type": "vad.speech_started", "turn_id": id}))
                .await;
        } else {
            self.control.send(json!({"type": "vad.speech_stopped"})).await;
            self.begin_awaiting_final(true).await;
        }
    }

    async fn on_error(&self, code: &str, message: &str) {
        self.control
            .send(json!({"type": "stt.error", "code": code, "message": message}))
            .await;
    }
}
