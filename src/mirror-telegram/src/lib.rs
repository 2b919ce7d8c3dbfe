//! Telegram side of the Discord mirror.
//!
//! [`TelegramClient`] implements [`mirror_relay::TargetClient`] over the Bot
//! API, classifying API errors into the relay's error kinds so the retry
//! middleware can tell benign failures from real ones.

pub mod api;
pub mod client;
pub mod config;

pub use api::classify;
pub use client::TelegramClient;
pub use config::TelegramConfig;
