pub mod flush;

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::state::AppState;

/// Periodically flushes the session so blink windows, combo timeouts and
/// trailing holds resolve even when frames stop arriving.
pub struct FlushWorker {
    state: AppState,
    shutdown_rx: broadcast::Receiver<()>,
    interval: Duration,
}

impl FlushWorker {
    pub fn new(state: AppState, shutdown_rx: broadcast::Receiver<()>) -> Self {
        let interval = Duration::from_millis(state.config().limits.flush_interval_ms.max(1));
        Self {
            state,
            shutdown_rx,
            interval,
        }
    }

    pub async fn start(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Flush worker started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    flush::run(&self.state).await;
                }
                _ = self.shutdown_rx.recv() => {
                    break;
                }
            }
        }
        tracing::info!("Flush worker stopped");
    }
}
