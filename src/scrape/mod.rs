//! Scraping of the profile page: fetching markup and extracting raw fields.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  Scheduler                   │
//! └──────────────┬──────────────────────┬────────┘
//!                │                      │
//!         ┌──────▼──────┐        ┌──────▼─────────┐
//!         │ PageSource  │ (trait)│ FieldExtractor │
//!         └──────┬──────┘        └────────────────┘
//!                │
//!        ┌───────┴────────┐
//!        │                │
//! ┌──────▼───────┐ ┌──────▼──────┐
//! │HttpPageSource│ │  MockPage   │
//! │  (reqwest)   │ │  (testing)  │
//! └──────────────┘ └─────────────┘
//! ```

mod extractor;
mod fetcher;
pub mod mock;
mod traits;

pub use extractor::{ExtractedFields, FieldExtractor, extract};
pub use fetcher::HttpPageSource;
pub use mock::MockPage;
pub use traits::PageSource;

use thiserror::Error;

/// Everything needed to fetch and read the target page.
///
/// Fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    pub url: String,
    pub cookie: String,
    pub user_agent: String,
    pub upload_selector: String,
    pub download_selector: String,
}

/// Errors that abort a whole tick.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Transport-level failure: DNS, refused connection, broken body.
    #[error("network error: {0}")]
    Network(String),
    /// The page answered with something other than 200 OK.
    #[error("unexpected HTTP status {code}")]
    HttpStatus { code: u16 },
    /// The page could not be queried as a document.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ScrapeError {
    fn from(e: reqwest::Error) -> Self {
        ScrapeError::Network(e.to_string())
    }
}
