//! Utility modules for ratio-exporter.

mod size_parser;

pub use size_parser::{SizeParseError, parse_size};
