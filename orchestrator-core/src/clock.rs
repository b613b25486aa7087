//! Heartbeat clock: the sole source of logical time. See `spec.md` §4.1.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{error, info, instrument, warn};

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("clock is already running")]
    AlreadyRunning,
}

/// A listener invoked on every tick, in registration order.
#[async_trait]
pub trait TickListener: Send + Sync {
    async fn on_tick(&self, tick: u64) -> Result<(), String>;
}

/// Emits monotonically increasing ticks at a fixed interval.
pub struct HeartbeatClock {
    interval_ms: u64,
    listeners: Mutex<Vec<Arc<dyn TickListener>>>,
    current_tick: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    started_at: Mutex<Option<Instant>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatClock {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            listeners: Mutex::new(Vec::new()),
            current_tick: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            started_at: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub async fn register(&self, listener: Arc<dyn TickListener>) {
        self.listeners.lock().await.push(listener);
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick.load(Ordering::SeqCst)
    }

    pub async fn elapsed_ms(&self) -> u64 {
        match *self.started_at.lock().await {
            Some(start) => start.elapsed().as_millis() as u64,
            None => 0,
        }
    }

    /// Starts the tick loop on a background task. Fails if already running.
    /// Resets `current_tick` to 0, including on restart after `stop`.
    #[instrument(skip(self))]
    pub async fn start(self: &Arc<Self>) -> Result<(), ClockError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ClockError::AlreadyRunning);
        }

        self.current_tick.store(0, Ordering::SeqCst);
        *self.started_at.lock().await = Some(Instant::now());

        let clock = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(clock.interval_ms));
            loop {
                ticker.tick().await;
                if !clock.running.load(Ordering::SeqCst) {
                    break;
                }
                clock.fire_tick().await;
            }
        });

        *self.task.lock().await = Some(handle);
        info!(interval_ms = self.interval_ms, "heartbeat clock started");
        Ok(())
    }

    async fn fire_tick(&self) {
        let tick = self.current_tick.fetch_add(1, Ordering::SeqCst);
        let listeners = self.listeners.lock().await.clone();
        for (idx, listener) in listeners.into_iter().enumerate() {
            // Each listener runs on its own task so a panic there becomes a
            // JoinError we can log and swallow instead of killing the clock.
            let result = tokio::spawn(async move { listener.on_tick(tick).await }).await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(listener = idx, tick, error = %e, "tick listener returned an error"),
                Err(join_err) => error!(listener = idx, tick, error = %join_err, "tick listener panicked"),
            }
        }
    }

    /// Stops the tick loop. Idempotent.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
        info!("heartbeat clock stopped");
    }
}
