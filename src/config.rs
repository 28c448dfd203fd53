//! Startup configuration from environment variables (or matching CLI flags).

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use reqwest::Url;
use reqwest::header::HeaderValue;
use thiserror::Error;

use crate::scrape::{FetchTarget, FieldExtractor};

/// Default Telegram chat for notifications.
pub const DEFAULT_TELEGRAM_CHAT_ID: i64 = 294967926;

/// Fatal configuration problems, reported before anything starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required setting {0} is empty")]
    Empty(&'static str),
    #[error("FETCH_INTERVAL must be at least one second")]
    ZeroInterval,
    #[error("invalid PROFILE_URL '{url}': {reason}")]
    Url { url: String, reason: String },
    #[error("{0} contains characters not allowed in an HTTP header")]
    Header(&'static str),
    #[error("{reason}")]
    Selector { selector: String, reason: String },
}

/// Prometheus exporter for upload/download totals scraped from a profile page.
#[derive(Parser, Debug, Clone)]
#[command(name = "ratio-exporter", about = "Profile page upload/download exporter", version)]
pub struct Args {
    /// Port for the metrics HTTP server.
    #[arg(long, env = "EXPORTER_PORT", default_value_t = 17500)]
    pub port: u16,

    /// Seconds between page fetches.
    #[arg(long, env = "FETCH_INTERVAL", default_value_t = 3600)]
    pub interval: u64,

    /// Literal Cookie header sent with every fetch.
    #[arg(long, env = "COOKIE_STRING", hide_env_values = true)]
    pub cookie: String,

    /// URL of the profile page.
    #[arg(long, env = "PROFILE_URL")]
    pub url: String,

    /// Literal User-Agent header sent with every fetch.
    #[arg(long, env = "USER_AGENT")]
    pub user_agent: String,

    /// CSS selector of the element holding the downloaded amount.
    #[arg(long, env = "DL_ELEMENT_SELECTOR")]
    pub dl_selector: String,

    /// CSS selector of the element holding the uploaded amount.
    #[arg(long, env = "UL_ELEMENT_SELECTOR")]
    pub ul_selector: String,

    /// Telegram bot token. Notifications are disabled when unset.
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: Option<String>,

    /// Telegram chat that receives notifications.
    #[arg(long, env = "TELEGRAM_CHAT_ID", default_value_t = DEFAULT_TELEGRAM_CHAT_ID)]
    pub telegram_chat_id: i64,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    pub quiet: bool,
}

/// Where notifications go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: i64,
}

/// Validated, immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub listen: SocketAddr,
    pub interval: Duration,
    pub target: FetchTarget,
    pub telegram: Option<TelegramConfig>,
}

impl Args {
    /// Validates the raw arguments.
    pub fn into_config(self) -> Result<ExporterConfig, ConfigError> {
        let cookie = required("COOKIE_STRING", self.cookie)?;
        let url = required("PROFILE_URL", self.url)?;
        let user_agent = required("USER_AGENT", self.user_agent)?;
        let download_selector = required("DL_ELEMENT_SELECTOR", self.dl_selector)?;
        let upload_selector = required("UL_ELEMENT_SELECTOR", self.ul_selector)?;

        if self.interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        check_url(&url)?;
        if HeaderValue::from_str(&cookie).is_err() {
            return Err(ConfigError::Header("COOKIE_STRING"));
        }
        if HeaderValue::from_str(&user_agent).is_err() {
            return Err(ConfigError::Header("USER_AGENT"));
        }
        FieldExtractor::new(&upload_selector, &download_selector)?;

        let telegram = self
            .telegram_bot_token
            .filter(|token| !token.trim().is_empty())
            .map(|bot_token| TelegramConfig {
                bot_token,
                chat_id: self.telegram_chat_id,
            });

        Ok(ExporterConfig {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port)),
            interval: Duration::from_secs(self.interval),
            target: FetchTarget {
                url,
                cookie,
                user_agent,
                upload_selector,
                download_selector,
            },
            telegram,
        })
    }
}

fn required(name: &'static str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Empty(name))
    } else {
        Ok(value)
    }
}

fn check_url(url: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(url).map_err(|e| ConfigError::Url {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Url {
            url: url.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 10] = [
        "--cookie",
        "uid=1; pass=x",
        "--url",
        "https://tracker.example/user.php?id=1",
        "--user-agent",
        "Mozilla/5.0",
        "--dl-selector",
        "td.down",
        "--ul-selector",
        "td.up",
    ];

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        let argv = std::iter::once("ratio-exporter")
            .chain(REQUIRED)
            .chain(extra.iter().copied());
        Args::try_parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap().into_config().unwrap();
        assert_eq!(config.listen.port(), 17500);
        assert_eq!(config.interval, Duration::from_secs(3600));
        assert_eq!(config.target.upload_selector, "td.up");
        assert_eq!(config.target.download_selector, "td.down");
        assert!(config.telegram.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = parse(&[
            "--port",
            "9100",
            "--interval",
            "1800",
            "--telegram-bot-token",
            "123:abc",
            "--telegram-chat-id=-1001",
        ])
        .unwrap()
        .into_config()
        .unwrap();
        assert_eq!(config.listen.port(), 9100);
        assert_eq!(config.interval, Duration::from_secs(1800));
        assert_eq!(
            config.telegram,
            Some(TelegramConfig {
                bot_token: "123:abc".to_string(),
                chat_id: -1001,
            })
        );
    }

    #[test]
    fn test_missing_required_setting_fails() {
        let result = Args::try_parse_from(["ratio-exporter", "--cookie", "x", "--url", "http://a"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_number_fails() {
        assert!(parse(&["--port", "not-a-port"]).is_err());
        assert!(parse(&["--interval", "-5"]).is_err());
    }

    #[test]
    fn test_empty_value_fails_validation() {
        let mut args = parse(&[]).unwrap();
        args.cookie = "  ".to_string();
        assert!(matches!(
            args.into_config(),
            Err(ConfigError::Empty("COOKIE_STRING"))
        ));
    }

    #[test]
    fn test_zero_interval_fails_validation() {
        let args = parse(&["--interval", "0"]).unwrap();
        assert!(matches!(args.into_config(), Err(ConfigError::ZeroInterval)));
    }

    #[test]
    fn test_bad_url_fails_validation() {
        let mut args = parse(&[]).unwrap();
        args.url = "not a url".to_string();
        assert!(matches!(args.into_config(), Err(ConfigError::Url { .. })));

        let mut args = parse(&[]).unwrap();
        args.url = "ftp://tracker.example/profile".to_string();
        assert!(matches!(args.into_config(), Err(ConfigError::Url { .. })));
    }

    #[test]
    fn test_bad_selector_fails_validation() {
        let mut args = parse(&[]).unwrap();
        args.ul_selector = "td[".to_string();
        assert!(matches!(
            args.into_config(),
            Err(ConfigError::Selector { .. })
        ));
    }

    #[test]
    fn test_header_injection_rejected() {
        let mut args = parse(&[]).unwrap();
        args.cookie = "a=b\r\nX-Evil: 1".to_string();
        assert!(matches!(
            args.into_config(),
            Err(ConfigError::Header("COOKIE_STRING"))
        ));
    }

    #[test]
    fn test_blank_telegram_token_disables_notifications() {
        let config = parse(&["--telegram-bot-token", " "])
            .unwrap()
            .into_config()
            .unwrap();
        assert!(config.telegram.is_none());
    }
}
