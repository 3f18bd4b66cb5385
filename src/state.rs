use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, Mutex};

use crate::config::Config;
use crate::constants::MAX_BATCH_LAG_MS;
use crate::remote::orchestrator::{RemoteControl, TickOutput};
use crate::remote::settings::RemoteControlSettings;
use crate::remote::types::{Command, ScreenTarget};

/// Maps wall-clock time onto the sensor's timestamp domain so flush ticks
/// can be issued between frames.
///
/// Frames arrive in batches: the batch after the anchor may still carry
/// samples up to one batch span past it. Sensor time only advances once that
/// span has elapsed, so a flush never runs ahead of undelivered frames.
#[derive(Debug, Clone, Copy)]
struct SensorClock {
    sensor_ms: i64,
    batch_span_ms: i64,
    observed_at: tokio::time::Instant,
}

impl SensorClock {
    fn at(&self, elapsed: Duration) -> i64 {
        let elapsed = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);
        let advance = elapsed.saturating_sub(self.batch_span_ms).max(0);
        self.sensor_ms.saturating_add(advance)
    }
}

/// One remote control session: the orchestrator plus everything that is
/// passed into each tick.
pub struct Session {
    pub remote: RemoteControl,
    pub settings: RemoteControlSettings,
    pub targets: Vec<ScreenTarget>,
    clock: Option<SensorClock>,
}

impl Session {
    pub fn new(mut remote: RemoteControl, settings: RemoteControlSettings) -> Self {
        remote.apply_settings(&settings);
        Self {
            remote,
            settings,
            targets: Vec::new(),
            clock: None,
        }
    }

    /// Anchor the sensor clock on a delivered batch covering
    /// `first_ms..=last_ms`.
    pub fn observe_batch(&mut self, first_ms: i64, last_ms: i64) {
        self.clock = Some(SensorClock {
            sensor_ms: last_ms,
            batch_span_ms: last_ms.saturating_sub(first_ms).clamp(0, MAX_BATCH_LAG_MS),
            observed_at: tokio::time::Instant::now(),
        });
    }

    /// Current time in the sensor's domain, if any frame was seen yet.
    pub fn sensor_now(&self) -> Option<i64> {
        self.clock.map(|c| c.at(c.observed_at.elapsed()))
    }

    /// Run a flush tick at the estimated sensor time.
    pub fn flush(&mut self) -> Option<TickOutput> {
        let now = self.sensor_now()?;
        Some(self.remote.flush(now, &self.targets, &self.settings))
    }
}

#[derive(Clone)]
pub struct AppState {
    session: Arc<Mutex<Session>>,
    events: broadcast::Sender<Command>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    sse_connections: Arc<AtomicUsize>,
    started_at: Instant,
}

impl AppState {
    pub fn new(remote: RemoteControl, config: &Config, shutdown_tx: broadcast::Sender<()>) -> Self {
        let (events, _) = broadcast::channel(config.limits.event_channel_capacity.max(1));
        let session = Session::new(remote, config.remote.to_settings());
        Self {
            session: Arc::new(Mutex::new(session)),
            events,
            config: Arc::new(config.clone()),
            shutdown_tx,
            sse_connections: Arc::new(AtomicUsize::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn session(&self) -> &Mutex<Session> {
        &self.session
    }

    /// Fan commands out to every live event subscriber.
    pub fn publish(&self, commands: &[Command]) {
        for command in commands {
            // no subscribers is fine
            let _ = self.events.send(command.clone());
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Command> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Live SSE connection count, shared with each stream's drop guard.
    pub fn sse_connections(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.sse_connections)
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
