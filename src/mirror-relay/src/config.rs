//! Relay configuration.
//!
//! Supports loading configuration from:
//! - a TOML file
//! - environment variables (a `.env` file is loaded by the binary first)
//!
//! Environment variables override values from the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use mirror_markup::MentionTable;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::error::{RelayError, RelayResult};
use crate::handlers::HandlerSettings;
use crate::pipeline::RetryPolicy;
use crate::relay::RelayOptions;
use crate::store::DEFAULT_TTL_HOURS;

/// Default Telegram Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

const ENV_SOURCE_CHANNEL: &str = "DISCORD_CHANNEL_ID";
const ENV_TOKEN: &str = "TELEGRAM_TOKEN";
const ENV_CHAT_ID: &str = "TELEGRAM_CHANNEL_ID";
const ENV_THREAD_ID: &str = "TELEGRAM_THREAD_ID";
const ENV_API_URL: &str = "TELEGRAM_API_URL";
const ENV_TRACKED_PATH: &str = "MIRROR_TRACKED_PATH";
const ENV_TTL_HOURS: &str = "MIRROR_TTL_HOURS";
const ENV_RETRY_ATTEMPTS: &str = "MIRROR_RETRY_ATTEMPTS";
const ENV_RETRY_DELAY_MS: &str = "MIRROR_RETRY_DELAY_MS";
const ENV_SHUTDOWN_GRACE: &str = "MIRROR_SHUTDOWN_GRACE_SECS";
const ENV_SWEEP_INTERVAL: &str = "MIRROR_SWEEP_INTERVAL_SECS";

/// Where messages are read from.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    pub channel_id: Option<String>,
    pub self_user_id: Option<String>,
    pub only_bots: bool,
    pub skip_prefixes: Vec<String>,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            channel_id: None,
            self_user_id: None,
            only_bots: true,
            skip_prefixes: Vec::new(),
        }
    }
}

/// Where messages are mirrored to.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TelegramSection {
    #[serde(deserialize_with = "deserialize_secret")]
    pub token: Option<SecretString>,
    pub chat_id: Option<i64>,
    pub thread_id: Option<i64>,
    pub api_url: String,
}

impl Default for TelegramSection {
    fn default() -> Self {
        Self {
            token: None,
            chat_id: None,
            thread_id: None,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for TelegramSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSection")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("chat_id", &self.chat_id)
            .field("thread_id", &self.thread_id)
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub path: PathBuf,
    pub ttl_hours: i64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("tracked.json"),
            ttl_hours: DEFAULT_TTL_HOURS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    pub shutdown_grace_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: 5,
            sweep_interval_secs: 3600,
        }
    }
}

/// Complete relay configuration. Every field has a default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub source: SourceSection,
    pub telegram: TelegramSection,
    pub store: StoreSection,
    pub retry: RetrySection,
    pub runtime: RuntimeSection,
    /// Static names used to resolve mentions.
    pub directory: MentionTable,
}

impl RelayConfig {
    /// Parse a TOML document.
    pub fn parse(content: &str) -> RelayResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> RelayResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "Loaded relay config");
        Ok(config)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> RelayResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from the process environment.
    pub fn apply_env(&mut self) -> RelayResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override fields from `lookup`. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> RelayResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(channel) = get(ENV_SOURCE_CHANNEL) {
            self.source.channel_id = Some(channel);
        }
        if let Some(token) = get(ENV_TOKEN) {
            self.telegram.token = Some(SecretString::new(token.into()));
        }
        if let Some(chat_id) = get(ENV_CHAT_ID) {
            self.telegram.chat_id = Some(parse_env(ENV_CHAT_ID, &chat_id)?);
        }
        if let Some(thread_id) = get(ENV_THREAD_ID) {
            self.telegram.thread_id = Some(parse_env(ENV_THREAD_ID, &thread_id)?);
        }
        if let Some(api_url) = get(ENV_API_URL) {
            self.telegram.api_url = api_url;
        }
        if let Some(path) = get(ENV_TRACKED_PATH) {
            self.store.path = PathBuf::from(path);
        }
        if let Some(ttl) = get(ENV_TTL_HOURS) {
            self.store.ttl_hours = parse_env(ENV_TTL_HOURS, &ttl)?;
        }
        if let Some(attempts) = get(ENV_RETRY_ATTEMPTS) {
            self.retry.attempts = parse_env(ENV_RETRY_ATTEMPTS, &attempts)?;
        }
        if let Some(delay) = get(ENV_RETRY_DELAY_MS) {
            self.retry.delay_ms = parse_env(ENV_RETRY_DELAY_MS, &delay)?;
        }
        if let Some(grace) = get(ENV_SHUTDOWN_GRACE) {
            self.runtime.shutdown_grace_secs = parse_env(ENV_SHUTDOWN_GRACE, &grace)?;
        }
        if let Some(interval) = get(ENV_SWEEP_INTERVAL) {
            self.runtime.sweep_interval_secs = parse_env(ENV_SWEEP_INTERVAL, &interval)?;
        }
        Ok(())
    }

    /// Reject settings the relay cannot run with.
    pub fn validate(&self) -> RelayResult<()> {
        if self.retry.attempts == 0 {
            return Err(RelayError::Config(
                "retry.attempts must be at least 1".to_string(),
            ));
        }
        if self.store.ttl_hours <= 0 {
            return Err(RelayError::Config(
                "store.ttl_hours must be positive".to_string(),
            ));
        }
        if TimeDelta::try_hours(self.store.ttl_hours)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .is_none()
        {
            return Err(RelayError::Config(format!(
                "store.ttl_hours={} is out of range",
                self.store.ttl_hours
            )));
        }
        if self.telegram.api_url.trim().is_empty() {
            return Err(RelayError::Config("telegram.api_url is empty".to_string()));
        }
        if self.source.channel_id.is_none() {
            warn!("{ENV_SOURCE_CHANNEL} is not set, no messages will be mirrored");
        }
        if self.telegram.chat_id.is_some() && self.telegram.token.is_none() {
            warn!("{ENV_TOKEN} is not set, requests to Telegram will be rejected");
        }
        Ok(())
    }

    /// Bot token, if configured.
    pub fn token(&self) -> Option<&str> {
        self.telegram.token.as_ref().map(|t| t.expose_secret())
    }

    /// Correlation TTL, saturating for values `validate` would reject.
    pub fn store_ttl(&self) -> TimeDelta {
        TimeDelta::try_hours(self.store.ttl_hours).unwrap_or(TimeDelta::MAX)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.attempts,
            delay: Duration::from_millis(self.retry.delay_ms),
            ignorable: Vec::new(),
        }
    }

    pub fn handler_settings(&self) -> HandlerSettings {
        HandlerSettings {
            source_channel_id: self.source.channel_id.clone(),
            self_user_id: self.source.self_user_id.clone(),
            only_bots: self.source.only_bots,
            skip_prefixes: self.source.skip_prefixes.clone(),
            retry: self.retry_policy(),
        }
    }

    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            tracked_path: Some(self.store.path.clone()),
            sweep_interval: Duration::from_secs(self.runtime.sweep_interval_secs),
            shutdown_grace: Duration::from_secs(self.runtime.shutdown_grace_secs),
        }
    }
}

fn parse_env<T>(key: &str, value: &str) -> RelayResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| RelayError::Config(format!("{key}={value:?} is invalid: {e}")))
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .filter(|v| !v.is_empty())
        .map(|v| SecretString::new(v.into())))
}
