//! Telegram Bot API client.
//!
//! All text is sent with `parse_mode=MarkdownV2`. Photos and documents are
//! downloaded from their source URL and re-uploaded as multipart bodies,
//! since Discord CDN links expire.

use async_trait::async_trait;
use mirror_relay::{
    RelayError, RelayResult, Sendable, TargetClient, TargetError, TargetErrorKind,
    TargetMessage, TargetResult,
};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::api::{ApiMessage, ApiResponse, InlineKeyboardMarkup, ReplyParameters, api_error};
use crate::config::TelegramConfig;

const PARSE_MODE: &str = "MarkdownV2";
const VOTE_BUTTON: &str = "VOTE HERE (Discord)";

/// [`TargetClient`] backed by the Telegram Bot API.
pub struct TelegramClient {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> RelayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.token(),
            method
        )
    }

    fn chat_id(&self) -> TargetResult<i64> {
        self.config.chat_id.ok_or_else(|| {
            TargetError::new(TargetErrorKind::Api, "target chat is not configured")
        })
    }

    /// Fields shared by every send call.
    fn send_params(&self, reply_to: Option<&TargetMessage>) -> TargetResult<Map<String, Value>> {
        let mut params = Map::new();
        params.insert("chat_id".into(), json!(self.chat_id()?));
        params.insert("parse_mode".into(), json!(PARSE_MODE));
        if let Some(thread_id) = self.config.thread_id {
            params.insert("message_thread_id".into(), json!(thread_id));
        }
        if let Some(reply) = reply_to {
            params.insert(
                "reply_parameters".into(),
                json!(ReplyParameters {
                    message_id: reply.message_id,
                    allow_sending_without_reply: true,
                }),
            );
        }
        Ok(params)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> TargetResult<T> {
        debug!(method, "Calling Telegram");
        let response = self
            .client
            .post(self.method_url(method))
            .json(&params)
            .send()
            .await
            .map_err(transport_error)?;
        read_response(response).await
    }

    async fn call_multipart<T: DeserializeOwned>(&self, method: &str, form: Form) -> TargetResult<T> {
        debug!(method, "Calling Telegram with upload");
        let response = self
            .client
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        read_response(response).await
    }

    async fn download(&self, url: &str) -> TargetResult<Vec<u8>> {
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TargetError::new(
                TargetErrorKind::Network,
                format!("failed to download {url}: {status}"),
            ));
        }
        let bytes = response.bytes().await.map_err(transport_error)?;
        debug!(url, size = bytes.len(), "Downloaded media");
        Ok(bytes.to_vec())
    }

    async fn send_media(
        &self,
        method: &str,
        field: &str,
        url: &str,
        filename: Option<&str>,
        caption: &str,
        reply_to: Option<&TargetMessage>,
    ) -> TargetResult<TargetMessage> {
        let bytes = self.download(url).await?;
        let mut form = Form::new().text("caption", caption.to_string());
        for (key, value) in self.send_params(reply_to)? {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            form = form.text(key, value);
        }
        let name = filename
            .map(str::to_string)
            .unwrap_or_else(|| file_name_from_url(url));
        form = form.part(field.to_string(), Part::bytes(bytes).file_name(name));

        let message: ApiMessage = self.call_multipart(method, form).await?;
        Ok(message.into())
    }
}

#[async_trait]
impl TargetClient for TelegramClient {
    fn is_configured(&self) -> bool {
        self.config.chat_id.is_some()
    }

    async fn send(
        &self,
        payload: &Sendable,
        reply_to: Option<&TargetMessage>,
    ) -> TargetResult<TargetMessage> {
        match payload {
            Sendable::Text { text } => {
                let mut params = self.send_params(reply_to)?;
                params.insert("text".into(), json!(text));
                let message: ApiMessage = self.call("sendMessage", Value::Object(params)).await?;
                Ok(message.into())
            }
            Sendable::Poll { vote_url, .. } => {
                let mut params = self.send_params(reply_to)?;
                params.insert("text".into(), json!(poll_text(payload)));
                params.insert(
                    "reply_markup".into(),
                    json!(InlineKeyboardMarkup::link(VOTE_BUTTON, vote_url.clone())),
                );
                let message: ApiMessage = self.call("sendMessage", Value::Object(params)).await?;
                Ok(message.into())
            }
            Sendable::Photo { url, caption } => {
                self.send_media("sendPhoto", "photo", url, None, caption, reply_to)
                    .await
            }
            Sendable::Document {
                url,
                filename,
                caption,
            } => {
                self.send_media(
                    "sendDocument",
                    "document",
                    url,
                    filename.as_deref(),
                    caption,
                    reply_to,
                )
                .await
            }
        }
    }

    async fn edit(&self, target: &TargetMessage, payload: &Sendable) -> TargetResult<TargetMessage> {
        let mut params = Map::new();
        params.insert("chat_id".into(), json!(target.chat_id));
        params.insert("message_id".into(), json!(target.message_id));
        params.insert("parse_mode".into(), json!(PARSE_MODE));

        let method = match payload {
            Sendable::Photo { caption, .. } | Sendable::Document { caption, .. } => {
                params.insert("caption".into(), json!(caption));
                "editMessageCaption"
            }
            Sendable::Text { text } => {
                params.insert("text".into(), json!(text));
                "editMessageText"
            }
            Sendable::Poll { vote_url, .. } => {
                params.insert("text".into(), json!(poll_text(payload)));
                params.insert(
                    "reply_markup".into(),
                    json!(InlineKeyboardMarkup::link(VOTE_BUTTON, vote_url.clone())),
                );
                "editMessageText"
            }
        };

        let message: ApiMessage = self.call(method, Value::Object(params)).await?;
        let mut edited: TargetMessage = message.into();
        if edited.thread_id.is_none() {
            edited.thread_id = target.thread_id;
        }
        Ok(edited)
    }

    async fn delete(&self, target: &TargetMessage) -> TargetResult<()> {
        let params = json!({
            "chat_id": target.chat_id,
            "message_id": target.message_id,
        });
        let _: bool = self.call("deleteMessage", params).await?;
        Ok(())
    }
}

/// Question followed by one line per answer.
fn poll_text(payload: &Sendable) -> String {
    let Sendable::Poll {
        question, answers, ..
    } = payload
    else {
        return payload.text().to_string();
    };
    let mut text = format!("*{question}*");
    for answer in answers {
        text.push_str("\n\\- ");
        text.push_str(answer);
    }
    text
}

fn file_name_from_url(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("file")
        .to_string()
}

fn transport_error(err: reqwest::Error) -> TargetError {
    let kind = if err.is_timeout() {
        TargetErrorKind::Timeout
    } else {
        TargetErrorKind::Network
    };
    TargetError::new(kind, err.to_string())
}

async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> TargetResult<T> {
    let status = response.status();
    let retry_after = response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok());
    let body = response.text().await.map_err(transport_error)?;

    let parsed: ApiResponse<T> = match serde_json::from_str(&body) {
        Ok(parsed) => parsed,
        Err(_) if status.as_u16() == 429 => {
            return Err(TargetError::rate_limited(retry_after.unwrap_or(30)));
        }
        Err(e) => {
            return Err(TargetError::new(
                TargetErrorKind::Api,
                format!("{status}: unexpected response ({e}): {body}"),
            ));
        }
    };

    if !parsed.ok {
        return Err(api_error(parsed));
    }
    parsed.result.ok_or_else(|| {
        TargetError::new(TargetErrorKind::Api, format!("{status}: response has no result"))
    })
}
