//! Lifecycle events delivered by the source platform.

use serde::{Deserialize, Serialize};

use crate::message::{HasAuthor, SourceMessage, User};

/// A message was posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCreate {
    pub message: SourceMessage,
}

/// A message was edited. `message` carries the new content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageUpdate {
    pub message: SourceMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<SourceMessage>,
}

/// A message was deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDelete {
    pub id: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<SourceMessage>,
}

/// Any event the relay reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceEvent {
    Create(MessageCreate),
    Update(MessageUpdate),
    Delete(MessageDelete),
}

impl SourceEvent {
    /// Id of the source message the event is about.
    pub fn message_id(&self) -> &str {
        match self {
            SourceEvent::Create(event) => &event.message.id,
            SourceEvent::Update(event) => &event.message.id,
            SourceEvent::Delete(event) => &event.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SourceEvent::Create(_) => "create",
            SourceEvent::Update(_) => "update",
            SourceEvent::Delete(_) => "delete",
        }
    }
}

impl HasAuthor for MessageCreate {
    fn author_user(&self) -> Option<&User> {
        self.message.author_user()
    }
}

impl HasAuthor for MessageUpdate {
    fn author_user(&self) -> Option<&User> {
        self.message
            .author_user()
            .or_else(|| self.before.author_user())
    }
}

impl HasAuthor for MessageDelete {
    fn author_user(&self) -> Option<&User> {
        self.before.author_user()
    }
}
