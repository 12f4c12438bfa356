//! A [`vox_core::ControlChannel`] backed by an mpsc queue, drained by the
//! websocket forwarding task once a client attaches to `/{id}/control`.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use vox_core::ControlChannel;

pub struct ChannelControlChannel {
    tx: mpsc::Sender<Value>,
}

impl ChannelControlChannel {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Value>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ControlChannel for ChannelControlChannel {
    async fn send(&self, envelope: Value) {
        if let Err(e) = self.tx.try_send(envelope) {
            tracing::warn!(error = %e, "control channel not open or backed up; discarding envelope");
        }
    }
}
