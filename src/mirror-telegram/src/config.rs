//! Client configuration.

use std::time::Duration;

use mirror_relay::RelayConfig;
use mirror_relay::config::DEFAULT_API_URL;
use secrecy::{ExposeSecret, SecretString};

/// Configuration for [`crate::TelegramClient`].
#[derive(Clone)]
pub struct TelegramConfig {
    token: SecretString,
    /// Destination chat. Nothing is sent while unset.
    pub chat_id: Option<i64>,
    /// Forum topic within the chat.
    pub thread_id: Option<i64>,
    /// Bot API base URL.
    pub api_url: String,
    /// Timeout for each HTTP request.
    pub timeout: Duration,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("chat_id", &self.chat_id)
            .field("thread_id", &self.thread_id)
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into().into()),
            chat_id: None,
            thread_id: None,
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_chat(mut self, chat_id: i64, thread_id: Option<i64>) -> Self {
        self.chat_id = Some(chat_id);
        self.thread_id = thread_id;
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Take the `[telegram]` section of a relay config. A missing token
    /// yields an empty one, which Telegram rejects.
    pub fn from_relay(config: &RelayConfig) -> Self {
        let mut telegram = Self::new(config.token().unwrap_or_default())
            .with_api_url(config.telegram.api_url.clone());
        telegram.chat_id = config.telegram.chat_id;
        telegram.thread_id = config.telegram.thread_id;
        telegram
    }

    pub(crate) fn token(&self) -> &str {
        self.token.expose_secret()
    }
}
