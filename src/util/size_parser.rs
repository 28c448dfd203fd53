//! Parser for human-readable byte quantities scraped from web pages.
//!
//! Accepted input is a number followed by a unit symbol, with a few
//! tolerated irregularities seen in real markup:
//! - Parenthetical annotations: `1.5 GB (1.39 GiB)`
//! - Thousands separators: `1,500 MB`, `1 500 MB`
//! - No space before the unit: `1.5GB`
//!
//! | Family | Symbols | Multiplier |
//! |--------|---------|------------|
//! | Bytes | `B` | 1 |
//! | Decimal | `KB`, `MB`, `GB`, `TB` | 1000^n |
//! | Binary | `KiB`, `MiB`, `GiB`, `TiB` | 1024^n |

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Unit symbol to byte multiplier. Lookups are case-sensitive.
static UNITS: LazyLock<HashMap<&'static str, f64>> = LazyLock::new(|| {
    HashMap::from([
        ("B", 1.0),
        ("KB", 1e3),
        ("MB", 1e6),
        ("GB", 1e9),
        ("TB", 1e12),
        ("KiB", (1u64 << 10) as f64),
        ("MiB", (1u64 << 20) as f64),
        ("GiB", (1u64 << 30) as f64),
        ("TiB", (1u64 << 40) as f64),
    ])
});

static ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("annotation pattern is valid"));

static UNIT_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)([A-Za-z])").expect("unit boundary pattern is valid"));

/// Error type for size parsing failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizeParseError {
    /// Input is not `<number> <unit>` after normalization.
    #[error("invalid size format '{input}'")]
    Format { input: String },
    /// Number is fine but the unit symbol is not known.
    #[error("unrecognized unit '{unit}' in '{input}'")]
    UnknownUnit { unit: String, input: String },
}

/// Parses a human-readable size string into a number of bytes.
///
/// The result keeps full `f64` precision; nothing is rounded.
///
/// # Examples
///
/// ```
/// use ratio_exporter::util::parse_size;
///
/// assert_eq!(parse_size("1.5 GB").unwrap(), 1.5e9);
/// assert_eq!(parse_size("2KiB").unwrap(), 2048.0);
/// assert_eq!(parse_size("1,024 B (1 KiB)").unwrap(), 1024.0);
/// ```
pub fn parse_size(input: &str) -> Result<f64, SizeParseError> {
    let normalized = normalize(input);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    let [number, unit] = tokens.as_slice() else {
        return Err(SizeParseError::Format {
            input: input.to_string(),
        });
    };

    let value = number
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SizeParseError::Format {
            input: input.to_string(),
        })?;

    let multiplier = UNITS
        .get(*unit)
        .ok_or_else(|| SizeParseError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

    Ok(value * multiplier)
}

/// Rewrites raw text into `<number> <unit>` shape where possible.
fn normalize(input: &str) -> String {
    let without_notes = ANNOTATION.replace_all(input, " ");
    let compact = strip_separators(&without_notes);
    UNIT_BOUNDARY.replace_all(&compact, "$1 $2").into_owned()
}

/// Drops thousands separators and whitespace sitting between two digits.
fn strip_separators(input: &str) -> String {
    let chars: Vec<char> = input
        .chars()
        .filter(|c| !matches!(c, ',' | '\u{00A0}' | '\u{202F}'))
        .collect();

    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() && out.ends_with(|p: char| p.is_ascii_digit()) {
            let next = chars[i..].iter().find(|n| !n.is_whitespace());
            if next.is_some_and(|n| n.is_ascii_digit()) {
                i += 1;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}
