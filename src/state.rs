//! State shared between the fetch loop and the metrics server.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::metrics::{MetricSink, MetricsError};

/// Outcome bookkeeping for the fetch loop, surfaced on `/health`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickHealth {
    /// Ticks run since startup, successful or not.
    pub ticks: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Whether the most recent tick was healthy; `None` before the first tick.
    pub last_tick_ok: Option<bool>,
}

impl TickHealth {
    pub fn status(&self) -> &'static str {
        match self.last_tick_ok {
            None => "starting",
            Some(true) => "ok",
            Some(false) => "stale",
        }
    }
}

/// The one object both concurrent units hold.
///
/// Gauges are written by the scheduler and read by every scrape; the health
/// record sits behind a mutex that is never held across an await.
pub struct ExporterState {
    sink: MetricSink,
    health: Mutex<TickHealth>,
    started_at: Instant,
}

pub type SharedState = Arc<ExporterState>;

impl ExporterState {
    pub fn new() -> Result<Self, MetricsError> {
        Ok(Self {
            sink: MetricSink::new()?,
            health: Mutex::new(TickHealth::default()),
            started_at: Instant::now(),
        })
    }

    pub fn shared() -> Result<SharedState, MetricsError> {
        Self::new().map(Arc::new)
    }

    pub fn sink(&self) -> &MetricSink {
        &self.sink
    }

    /// Records a tick in which every present field was published.
    pub fn record_success(&self) {
        let mut health = self.lock_health();
        health.ticks += 1;
        health.last_success = Some(Utc::now());
        health.last_error = None;
        health.last_tick_ok = Some(true);
    }

    /// Records a tick that failed as a whole or for one field.
    pub fn record_failure(&self, error: impl Into<String>) {
        let mut health = self.lock_health();
        health.ticks += 1;
        health.last_error = Some(error.into());
        health.last_tick_ok = Some(false);
    }

    pub fn health(&self) -> TickHealth {
        self.lock_health().clone()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    fn lock_health(&self) -> std::sync::MutexGuard<'_, TickHealth> {
        self.health.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_lifecycle() {
        let state = ExporterState::new().unwrap();
        assert_eq!(state.health().status(), "starting");

        state.record_failure("unexpected HTTP status 503");
        let health = state.health();
        assert_eq!(health.status(), "stale");
        assert_eq!(health.ticks, 1);
        assert!(health.last_success.is_none());

        state.record_success();
        let health = state.health();
        assert_eq!(health.status(), "ok");
        assert_eq!(health.ticks, 2);
        assert!(health.last_success.is_some());
        assert!(health.last_error.is_none());
    }

    #[test]
    fn test_failure_keeps_last_success() {
        let state = ExporterState::new().unwrap();
        state.record_success();
        let first = state.health().last_success;

        state.record_failure("network error: refused");
        assert_eq!(state.health().last_success, first);
    }
}
