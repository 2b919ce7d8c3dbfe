//! Bot API wire types and error classification.

use mirror_relay::{TargetError, TargetErrorKind, TargetMessage};
use serde::{Deserialize, Serialize};

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub error_code: Option<u16>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponseParameters {
    #[serde(default)]
    pub retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// The subset of a Bot API `Message` the client needs.
#[derive(Debug, Deserialize)]
pub struct ApiMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub message_thread_id: Option<i64>,
}

impl From<ApiMessage> for TargetMessage {
    fn from(message: ApiMessage) -> Self {
        TargetMessage {
            message_id: message.message_id,
            chat_id: message.chat.id,
            thread_id: message.message_thread_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReplyParameters {
    pub message_id: i64,
    pub allow_sending_without_reply: bool,
}

#[derive(Debug, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    /// A single URL button.
    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            inline_keyboard: vec![vec![InlineKeyboardButton {
                text: text.into(),
                url: url.into(),
            }]],
        }
    }
}

/// Map a Bot API error description onto a [`TargetErrorKind`].
pub fn classify(description: &str) -> TargetErrorKind {
    let lower = description.to_ascii_lowercase();
    if lower.contains("message is not modified") {
        TargetErrorKind::NotModified
    } else if lower.contains("message can't be edited") {
        TargetErrorKind::TooOldToEdit
    } else if lower.contains("message text is empty") || lower.contains("text must be non-empty")
    {
        TargetErrorKind::EmptyText
    } else if lower.contains("message must be non-empty") {
        TargetErrorKind::EmptyMessage
    } else if lower.contains("message to delete not found")
        || lower.contains("message to edit not found")
        || lower.contains("message can't be deleted")
    {
        TargetErrorKind::NotFound
    } else if lower.contains("too many requests") {
        TargetErrorKind::RateLimited
    } else {
        TargetErrorKind::Api
    }
}

/// Build the error for a response with `ok: false`.
pub fn api_error<T>(response: ApiResponse<T>) -> TargetError {
    let description = response
        .description
        .unwrap_or_else(|| format!("error code {}", response.error_code.unwrap_or_default()));
    let retry_after = response.parameters.and_then(|p| p.retry_after);
    match (response.error_code, retry_after) {
        (Some(429), Some(secs)) => TargetError {
            description,
            ..TargetError::rate_limited(secs)
        },
        _ => TargetError::new(classify(&description), description),
    }
}
