//! ratio-exporter - Prometheus exporter for upload/download totals shown on a
//! cookie-authenticated profile page.
//!
//! Modules:
//! - `util` - human-readable size parsing
//! - `scrape` - page fetching and field extraction
//! - `metrics` - the two gauges and their exposition
//! - `state` - state shared between the fetch loop and the HTTP server
//! - `background` - the fixed-interval fetch loop
//! - `handlers` - `/metrics` and `/health`
//! - `notify` - optional Telegram notifications
//! - `config` - environment configuration

pub mod background;
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod notify;
pub mod scrape;
pub mod state;
pub mod util;
