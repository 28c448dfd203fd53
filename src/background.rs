//! Fetch loop: fetch → extract → parse → publish, once per interval.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::ConfigError;
use crate::metrics::Direction;
use crate::notify::{Notifier, Transition};
use crate::scrape::{FieldExtractor, PageSource, ScrapeError};
use crate::state::SharedState;
use crate::util::{SizeParseError, parse_size};

/// Why a single field was not published.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error(transparent)]
    Size(#[from] SizeParseError),
    #[error("negative byte count {0}")]
    Negative(f64),
}

/// What happened to one field during a tick.
#[derive(Debug)]
pub enum FieldOutcome {
    /// Parsed and published.
    Updated(f64),
    /// Element absent or empty; gauge left as is.
    Missing,
    /// Text present but unusable; gauge left as is.
    Failed(FieldError),
}

impl FieldOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, FieldOutcome::Failed(_))
    }
}

/// Per-field outcomes of a tick that got as far as extraction.
#[derive(Debug)]
pub struct TickReport {
    pub upload: FieldOutcome,
    pub download: FieldOutcome,
}

impl TickReport {
    pub fn is_healthy(&self) -> bool {
        !self.upload.is_failed() && !self.download.is_failed()
    }

    fn failure_summary(&self) -> String {
        [
            (Direction::Upload, &self.upload),
            (Direction::Download, &self.download),
        ]
        .iter()
        .filter_map(|(direction, outcome)| match outcome {
            FieldOutcome::Failed(e) => Some(format!("{direction}: {e}")),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("; ")
    }
}

/// Drives the pipeline on a fixed interval.
///
/// Ticks never overlap: each one completes before the next is awaited.
pub struct Scheduler<S: PageSource> {
    source: S,
    extractor: FieldExtractor,
    state: SharedState,
    interval: Duration,
    notifier: Option<Notifier>,
    last_tick_ok: Option<bool>,
}

impl<S: PageSource> Scheduler<S> {
    /// Fails with [`ConfigError::ZeroInterval`] for a zero interval.
    pub fn new(
        source: S,
        extractor: FieldExtractor,
        state: SharedState,
        interval: Duration,
    ) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(Self {
            source,
            extractor,
            state,
            interval,
            notifier: None,
            last_tick_ok: None,
        })
    }

    /// Sends a message on every health transition.
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Runs ticks until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// The first tick fires immediately. A tick still in flight when shutdown
    /// is requested is abandoned.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = self.interval.as_secs(), "starting fetch loop");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => {
                    info!("shutdown requested");
                    break;
                }
                _ = tick.tick() => {}
            }

            let t0 = Instant::now();
            tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => {
                    info!("shutdown requested, abandoning tick in flight");
                    break;
                }
                _ = self.run_tick() => {}
            }
            let elapsed = t0.elapsed();

            if elapsed > self.interval / 2 {
                warn!(
                    duration_ms = elapsed.as_millis() as u64,
                    interval_ms = self.interval.as_millis() as u64,
                    "tick exceeded 50% of interval"
                );
            }
        }

        info!("fetch loop stopped");
    }

    /// Executes exactly one tick.
    ///
    /// A fetch or extraction failure aborts the tick and leaves both gauges
    /// untouched. Otherwise each field is handled on its own: a bad upload
    /// value never keeps the download value from being published.
    pub async fn run_tick(&mut self) -> Result<TickReport, ScrapeError> {
        let t0 = Instant::now();
        let result = self.scrape().await;

        let healthy = match &result {
            Ok(report) if report.is_healthy() => {
                self.state.record_success();
                debug!(
                    duration_ms = t0.elapsed().as_millis() as u64,
                    "tick completed"
                );
                true
            }
            Ok(report) => {
                self.state.record_failure(report.failure_summary());
                false
            }
            Err(e) => {
                error!(error = %e, "tick aborted");
                self.state.record_failure(e.to_string());
                false
            }
        };

        self.notify_transition(healthy, &result).await;
        self.last_tick_ok = Some(healthy);
        result
    }

    async fn scrape(&self) -> Result<TickReport, ScrapeError> {
        let markup = self.source.fetch().await?;
        let fields = self.extractor.extract(&markup)?;
        debug!(upload = %fields.upload, download = %fields.download, "fields extracted");

        Ok(TickReport {
            upload: self.publish(Direction::Upload, &fields.upload),
            download: self.publish(Direction::Download, &fields.download),
        })
    }

    fn publish(&self, direction: Direction, text: &str) -> FieldOutcome {
        if text.is_empty() {
            warn!(%direction, "element not found");
            return FieldOutcome::Missing;
        }

        match parse_size(text) {
            Ok(bytes) if bytes < 0.0 => {
                warn!(%direction, text, bytes, "negative size ignored");
                FieldOutcome::Failed(FieldError::Negative(bytes))
            }
            Ok(bytes) => {
                self.state.sink().set(direction, bytes);
                info!(%direction, text, bytes, "sample updated");
                FieldOutcome::Updated(bytes)
            }
            Err(e) => {
                warn!(%direction, text, error = %e, "invalid size format");
                FieldOutcome::Failed(e.into())
            }
        }
    }

    async fn notify_transition(&self, healthy: bool, result: &Result<TickReport, ScrapeError>) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let message = match Transition::between(self.last_tick_ok, healthy) {
            Some(Transition::Failing) => {
                let reason = match result {
                    Ok(report) => report.failure_summary(),
                    Err(e) => e.to_string(),
                };
                format!("ratio-exporter: scraping failed ({reason}); serving last known values")
            }
            Some(Transition::Recovered) => "ratio-exporter: scraping recovered".to_string(),
            None => return,
        };
        notifier.send_logged(&message).await;
    }
}
