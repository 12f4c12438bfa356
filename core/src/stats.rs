//! Stats monitor: per-session "is audio actually flowing" watchdog.
//!
//! Adapted from the same `RwLock<Instant>` bookkeeping the rest of this
//! stack uses for runtime metrics. Every chunk the ingest path successfully
//! hands to the chunk accumulator marks the session as alive; a background
//! tick checks every 10 seconds whether that mark is stale and, if so, logs
//! a warning so an operator can tell a silent session apart from a muted
//! one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

const WATCH_INTERVAL: Duration = Duration::from_secs(10);

pub struct StatsMonitor {
    last_forwarded: RwLock<Instant>,
}

impl StatsMonitor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            last_forwarded: RwLock::new(Instant::now()),
        })
    }

    pub async fn mark_forwarded(&self) {
        *self.last_forwarded.write().await = Instant::now();
    }

    /// Spawn the background watch loop for `session_id`. Returns the handle
    /// so the session can abort it on shutdown.
    pub fn spawn_watch(self: &Arc<Self>, session_id: String) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(WATCH_INTERVAL);
            loop {
                ticker.tick().await;
                let elapsed = monitor.last_forwarded.read().await.elapsed();
                if elapsed >= WATCH_INTERVAL {
                    tracing::warn!(
                        session_id = %session_id,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "no audio forwarded to the transcription provider in the last monitoring window"
                    );
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mark_forwarded_resets_the_idle_clock() {
        let monitor = StatsMonitor::new();
        tokio::time::sleep(Duration::from_millis(5)).await;
        monitor.mark_forwarded().await;
        let elapsed = monitor.last_forwarded.read().await.elapsed();
        assert!(elapsed < Duration::from_millis(5));
    }
}
