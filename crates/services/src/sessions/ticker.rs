use std::sync::{Arc, Mutex};
use std::time::Duration;

use flash_core::format_elapsed;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::engine::SessionEngine;

/// Default refresh period of the elapsed-time display.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

/// Snapshot of both clocks, reported on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    pub total_ms: u64,
    pub card_ms: u64,
}

impl TimerTick {
    #[must_use]
    pub fn from_engine(engine: &SessionEngine) -> Self {
        Self {
            total_ms: engine.total_session_time_ms(),
            card_ms: engine.time_on_current_card_ms(),
        }
    }

    /// Session time as `MM:SS`.
    #[must_use]
    pub fn total(&self) -> String {
        format_elapsed(i64::try_from(self.total_ms).unwrap_or(i64::MAX))
    }

    /// Current-card time as `MM:SS`.
    #[must_use]
    pub fn card(&self) -> String {
        format_elapsed(i64::try_from(self.card_ms).unwrap_or(i64::MAX))
    }
}

/// Periodically reports elapsed times for display.
///
/// Holds no session state of its own; each tick reads the shared engine.
/// The background task ends by itself once the session is completed.
/// Must be started from within a Tokio runtime.
#[derive(Debug)]
pub struct SessionTicker {
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Default for SessionTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTicker {
    #[must_use]
    pub fn new() -> Self {
        Self::with_period(DEFAULT_TICK_PERIOD)
    }

    #[must_use]
    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            handle: None,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start ticking. Returns false (and does nothing) if already running or
    /// if the session is completed.
    pub fn start<F>(&mut self, engine: Arc<Mutex<SessionEngine>>, mut on_tick: F) -> bool
    where
        F: FnMut(TimerTick) + Send + 'static,
    {
        if self.is_running() {
            return false;
        }
        let completed = engine.lock().map_or(true, |e| e.is_completed());
        if completed {
            return false;
        }

        let period = self.period;
        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let tick = {
                    let Ok(guard) = engine.lock() else { break };
                    if guard.is_completed() {
                        break;
                    }
                    TimerTick::from_engine(&guard)
                };
                on_tick(tick);
            }
            tracing::debug!("session ticker finished");
        }));
        true
    }

    /// Stop ticking. Safe to call when not running.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for SessionTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
