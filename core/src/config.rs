//! Client settings loadable from JSON or the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ENV_BASE_URL: &str = "RESTCLIENT_BASE_URL";
pub const ENV_API_VERSION: &str = "RESTCLIENT_API_VERSION";
pub const ENV_LEGACY: &str = "RESTCLIENT_LEGACY";
pub const ENV_SYNC: &str = "RESTCLIENT_SYNC";
pub const ENV_POLL_PERIOD_MS: &str = "RESTCLIENT_POLL_PERIOD_MS";
pub const ENV_TIMEOUT_MS: &str = "RESTCLIENT_TIMEOUT_MS";

/// Everything `Client::from_config` needs besides a codec.
///
/// Durations are carried as milliseconds so the struct reads naturally from
/// JSON and environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_version: String,
    pub legacy_behavior: bool,
    pub sync: bool,
    /// Zero disables the built-in poller.
    pub poll_period_ms: u64,
    pub timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api/v1/".to_string(),
            api_version: "v1".to_string(),
            legacy_behavior: false,
            sync: false,
            poll_period_ms: 2_000,
            timeout_ms: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from a key lookup. Missing keys keep their defaults;
    /// unparsable values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_BASE_URL) {
            config.base_url = url;
        }
        if let Some(version) = lookup(ENV_API_VERSION) {
            config.api_version = version;
        }
        if let Some(legacy) = parsed(&lookup, ENV_LEGACY) {
            config.legacy_behavior = legacy;
        }
        if let Some(sync) = parsed(&lookup, ENV_SYNC) {
            config.sync = sync;
        }
        if let Some(period) = parsed(&lookup, ENV_POLL_PERIOD_MS) {
            config.poll_period_ms = period;
        }
        if let Some(timeout) = parsed::<u64>(&lookup, ENV_TIMEOUT_MS) {
            // 0 means "no timeout"
            config.timeout_ms = Some(timeout).filter(|t| *t > 0);
        }
        config
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}
