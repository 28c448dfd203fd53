//! Optional Telegram notifications when scraping starts failing or recovers.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::TelegramConfig;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Error sending a notification. Never fatal to the exporter.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Request(reqwest::Error),
    #[error("Telegram API returned {0}")]
    Status(u16),
}

// The endpoint URL embeds the bot token; keep it out of error messages.
impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        NotifyError::Request(e.without_url())
    }
}

/// Health change worth telling someone about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First failing tick after a healthy one, or at startup.
    Failing,
    /// First healthy tick after failures.
    Recovered,
}

impl Transition {
    /// Compares the previous tick outcome with the current one.
    ///
    /// Returns `None` while the state holds, so a long outage produces one
    /// message instead of one per tick.
    pub fn between(previous: Option<bool>, healthy: bool) -> Option<Self> {
        match (previous, healthy) {
            (Some(true) | None, false) => Some(Transition::Failing),
            (Some(false), true) => Some(Transition::Recovered),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Posts messages to a Telegram chat through the Bot API.
#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
    endpoint: String,
    chat_id: i64,
}

impl Notifier {
    pub fn new(config: &TelegramConfig) -> Result<Self, NotifyError> {
        Self::with_api_base(config, TELEGRAM_API)
    }

    /// Same as [`Notifier::new`] with a different Bot API host.
    pub fn with_api_base(config: &TelegramConfig, api_base: &str) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                config.bot_token
            ),
            chat_id: config.chat_id,
        })
    }

    /// Sends `text` to the configured chat.
    pub async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id: self.chat_id,
                text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        debug!(chat_id = self.chat_id, "notification sent");
        Ok(())
    }

    /// Sends `text`, logging instead of returning failures.
    pub async fn send_logged(&self, text: &str) {
        if let Err(e) = self.send(text).await {
            warn!(error = %e, "failed to send Telegram notification");
        }
    }
}
