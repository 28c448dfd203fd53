//! Prometheus gauges for the scraped upload/download totals.
//!
//! Each sink owns a private [`Registry`], so several sinks (e.g. one per test)
//! never collide. Gauge values live in atomic cells: a scrape running while the
//! scheduler writes sees either the old or the new value.

use prometheus::{Encoder, Gauge, Registry, TextEncoder};
use thiserror::Error;

/// Name of the upload gauge.
pub const UPLOAD_METRIC: &str = "upload_value_bytes";
/// Name of the download gauge.
pub const DOWNLOAD_METRIC: &str = "download_value_bytes";

const HELP: &str = "Value extracted from the webpage in bytes";

/// Error raised while building or encoding the registry.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("exposition is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Which of the two published samples a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Upload => "upload",
            Direction::Download => "download",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holds the last successfully parsed byte count per direction.
#[derive(Clone)]
pub struct MetricSink {
    registry: Registry,
    upload: Gauge,
    download: Gauge,
}

impl MetricSink {
    /// Creates both gauges and registers them.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let upload = Gauge::new(UPLOAD_METRIC, HELP)?;
        let download = Gauge::new(DOWNLOAD_METRIC, HELP)?;
        registry.register(Box::new(upload.clone()))?;
        registry.register(Box::new(download.clone()))?;
        Ok(Self {
            registry,
            upload,
            download,
        })
    }

    /// Overwrites the sample for `direction`.
    pub fn set(&self, direction: Direction, bytes: f64) {
        self.gauge(direction).set(bytes);
    }

    /// Current sample for `direction`. Zero until the first successful parse.
    pub fn get(&self, direction: Direction) -> f64 {
        self.gauge(direction).get()
    }

    /// Renders the registry in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    fn gauge(&self, direction: Direction) -> &Gauge {
        match direction {
            Direction::Upload => &self.upload,
            Direction::Download => &self.download,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn test_set_and_get_are_independent() {
        let sink = MetricSink::new().unwrap();
        assert_eq!(sink.get(Direction::Upload), 0.0);

        sink.set(Direction::Upload, 1.5e9);
        assert_eq!(sink.get(Direction::Upload), 1.5e9);
        assert_eq!(sink.get(Direction::Download), 0.0);
    }

    #[test]
    fn test_encode_exposition_format() {
        let sink = MetricSink::new().unwrap();
        sink.set(Direction::Upload, 2048.0);
        sink.set(Direction::Download, 1.5e9);

        let text = sink.encode().unwrap();
        assert!(text.contains("# HELP upload_value_bytes Value extracted from the webpage in bytes"));
        assert!(text.contains("# TYPE upload_value_bytes gauge"));
        assert!(text.contains("upload_value_bytes 2048"));
        assert!(text.contains("download_value_bytes 1500000000"));
    }

    #[test]
    fn test_sinks_do_not_share_registry() {
        let a = MetricSink::new().unwrap();
        let b = MetricSink::new().unwrap();
        a.set(Direction::Download, 7.0);
        assert_eq!(b.get(Direction::Download), 0.0);
    }

    #[test]
    fn test_concurrent_reads_never_torn() {
        // Bit patterns differ in both halves, so a torn read would produce a third value.
        let old = f64::from_bits(0x4000_0000_0000_0001);
        let new = f64::from_bits(0x4100_0000_ffff_0000);

        let sink = Arc::new(MetricSink::new().unwrap());
        sink.set(Direction::Upload, old);
        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let sink = sink.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut flip = false;
                while !stop.load(Ordering::Relaxed) {
                    sink.set(Direction::Upload, if flip { old } else { new });
                    flip = !flip;
                }
            })
        };

        for _ in 0..200_000 {
            let seen = sink.get(Direction::Upload);
            assert!(seen == old || seen == new, "torn read: {seen:e}");
        }

        stop.store(true, Ordering::Relaxed);
        writer.join().unwrap();
    }
}
