//! Scripted page source for testing the pipeline without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{PageSource, ScrapeError};

/// Replays queued responses in order, one per fetch.
///
/// Once the queue is drained every fetch fails with a network error.
#[derive(Debug, Default)]
pub struct MockPage {
    responses: Mutex<VecDeque<Result<String, ScrapeError>>>,
    fetches: AtomicUsize,
}

impl MockPage {
    /// Creates a mock with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful response with the given body.
    pub fn push_page(&self, body: impl Into<String>) -> &Self {
        self.push(Ok(body.into()))
    }

    /// Queues a failed fetch.
    pub fn push_error(&self, error: ScrapeError) -> &Self {
        self.push(Err(error))
    }

    /// Number of fetches performed so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn push(&self, response: Result<String, ScrapeError>) -> &Self {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
        self
    }
}

impl PageSource for MockPage {
    async fn fetch(&self) -> Result<String, ScrapeError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(ScrapeError::Network("no scripted response".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order() {
        let mock = MockPage::new();
        mock.push_page("first")
            .push_error(ScrapeError::HttpStatus { code: 502 });

        assert_eq!(mock.fetch().await.unwrap(), "first");
        assert!(matches!(
            mock.fetch().await,
            Err(ScrapeError::HttpStatus { code: 502 })
        ));
        assert!(matches!(mock.fetch().await, Err(ScrapeError::Network(_))));
        assert_eq!(mock.fetch_count(), 3);
    }
}
