//! Configuration types for debrid-relay

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Default REST base URL of the debrid service
pub const DEFAULT_DEBRID_BASE_URL: &str = "https://api.real-debrid.com/rest/1.0";

/// Top-level relay configuration
///
/// Only `feed_url` and `debrid.api_token` are required; everything else has a default.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// RSS feed to read magnet links from
    pub feed_url: String,

    /// Download ledger path (None = no history is kept between runs)
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,

    /// Maximum number of magnet links resolved concurrently (default: 3)
    ///
    /// Keeps the request rate under the debrid service's per-minute limit.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Debrid service settings
    pub debrid: DebridConfig,

    /// Retry behavior for remote API calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Interval between runs when running periodically (default: 15 minutes)
    #[serde(default = "default_check_interval", with = "duration_serde")]
    pub check_interval: Duration,
}

impl Config {
    /// Create a configuration with defaults for everything but the two required values
    pub fn new(feed_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            ledger_path: None,
            max_concurrent: default_max_concurrent(),
            debrid: DebridConfig {
                api_token: api_token.into(),
                ..DebridConfig::default()
            },
            retry: RetryConfig::default(),
            check_interval: default_check_interval(),
        }
    }

    /// Check the configuration for values that would make a run fail or misbehave
    ///
    /// Called before any network activity so that credential problems surface at startup.
    pub fn validate(&self) -> Result<()> {
        if self.feed_url.trim().is_empty() {
            return Err(config_error("feed URL is required", "feed_url"));
        }
        if self.debrid.api_token.trim().is_empty() {
            return Err(config_error(
                "debrid API token is required",
                "debrid.api_token",
            ));
        }
        if self.debrid.base_url.trim().is_empty() {
            return Err(config_error(
                "debrid base URL must not be empty",
                "debrid.base_url",
            ));
        }
        if self.max_concurrent == 0 {
            return Err(config_error(
                "max_concurrent must be at least 1",
                "max_concurrent",
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(config_error(
                "retry jitter must be between 0.0 and 1.0",
                "retry.jitter",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(config_error(
                "retry backoff multiplier must be at least 1.0",
                "retry.backoff_multiplier",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

/// Debrid service connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct DebridConfig {
    /// Bearer token for the REST API
    pub api_token: String,

    /// REST API base URL (default: Real-Debrid v1.0)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Fixed interval between torrent status polls (default: 1 second)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Per-request HTTP timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for DebridConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_url: default_base_url(),
            poll_interval: default_poll_interval(),
            request_timeout: default_request_timeout(),
        }
    }
}

// The token never ends up in logs.
impl std::fmt::Debug for DebridConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebridConfig")
            .field("api_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("poll_interval", &self.poll_interval)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Retry configuration for transient remote failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one (default: 8)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 2 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Jitter fraction applied to each delay, 0.25 = ±25% (default: 0.25, 0.0 disables)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
        }
    }
}

fn default_max_concurrent() -> usize {
    3
}

fn default_check_interval() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_base_url() -> String {
    DEFAULT_DEBRID_BASE_URL.to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    8
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.25
}

// Duration serialization helper (seconds, fractional allowed)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
