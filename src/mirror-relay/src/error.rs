//! Error types for the relay.
//!
//! Target-platform failures are classified into [`TargetErrorKind`]s so the
//! retry middleware can decide which of them are benign.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed call to the target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetErrorKind {
    /// The edit would not change the message.
    NotModified,
    /// The message can no longer be edited.
    TooOldToEdit,
    /// The text to send was empty.
    EmptyText,
    /// The message to send had no content at all.
    EmptyMessage,
    /// The target message does not exist (anymore).
    NotFound,
    /// Too many requests.
    RateLimited,
    /// Connection-level failure.
    Network,
    /// The request timed out.
    Timeout,
    /// Any other API error.
    Api,
}

impl TargetErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotModified => "not_modified",
            Self::TooOldToEdit => "too_old_to_edit",
            Self::EmptyText => "empty_text",
            Self::EmptyMessage => "empty_message",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Api => "api",
        }
    }
}

impl std::fmt::Display for TargetErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed send, edit or delete on the target platform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {description}")]
pub struct TargetError {
    pub kind: TargetErrorKind,
    /// Description returned by the platform.
    pub description: String,
    /// Seconds to wait before retrying, when the platform said so.
    pub retry_after_secs: Option<u64>,
    /// The rendered payload that was rejected, for diagnostics.
    pub rendered: Option<String>,
}

impl TargetError {
    pub fn new(kind: TargetErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            retry_after_secs: None,
            rendered: None,
        }
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self {
            retry_after_secs: Some(retry_after_secs),
            ..Self::new(
                TargetErrorKind::RateLimited,
                format!("retry after {retry_after_secs} seconds"),
            )
        }
    }

    /// Attach the payload that was being sent.
    pub fn with_rendered(mut self, rendered: impl Into<String>) -> Self {
        self.rendered = Some(rendered.into());
        self
    }
}

/// Errors that can occur while relaying messages.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration error (missing or invalid config).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The target platform rejected a call.
    #[error("Target platform error: {0}")]
    Target(#[from] TargetError),

    /// The source platform could not supply a message or name.
    #[error("Source platform error: {0}")]
    Source(String),

    /// The correlation file could not be read or written.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RelayError {
    /// Kind of the underlying target error, if this is one.
    pub fn target_kind(&self) -> Option<TargetErrorKind> {
        match self {
            RelayError::Target(err) => Some(err.kind),
            _ => None,
        }
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = std::result::Result<T, RelayError>;

/// Result type for target platform calls.
pub type TargetResult<T> = std::result::Result<T, TargetError>;
