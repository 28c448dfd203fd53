//! Abstraction over where page markup comes from.

use std::future::Future;
use std::sync::Arc;

use super::ScrapeError;

/// Source of raw page markup.
///
/// `HttpPageSource` fetches the real page; `MockPage` replays scripted
/// responses so the pipeline can be tested without a network.
pub trait PageSource: Send + Sync {
    /// Performs a single fetch attempt and returns the page body.
    fn fetch(&self) -> impl Future<Output = Result<String, ScrapeError>> + Send;
}

impl<T: PageSource> PageSource for Arc<T> {
    fn fetch(&self) -> impl Future<Output = Result<String, ScrapeError>> + Send {
        (**self).fetch()
    }
}
