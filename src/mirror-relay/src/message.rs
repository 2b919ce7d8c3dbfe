//! Source platform message model.
//!
//! Only the fields the relay reads are modeled. Unknown JSON fields are
//! ignored so raw gateway payloads can be fed in directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Discord user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// Global display name, falling back to the username.
    pub fn display_name(&self) -> &str {
        self.global_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
    }
}

/// Guild membership of the author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// Image or thumbnail of an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedMedia {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedMedia>,
}

impl Embed {
    /// Image URL if present, else thumbnail URL.
    pub fn picture_url(&self) -> Option<&str> {
        self.image
            .as_ref()
            .or(self.thumbnail.as_ref())
            .map(|media| media.url.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub question: String,
    #[serde(default)]
    pub answers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub allow_multiselect: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    #[default]
    Reply,
    Forward,
}

/// Pointer to a replied-to or forwarded message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReference {
    #[serde(default)]
    pub kind: ReferenceKind,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
}

/// A message on the source platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMessage {
    pub id: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<Member>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<MessageReference>,
}

impl SourceMessage {
    pub fn new(id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            guild_id: None,
            content: String::new(),
            author: None,
            member: None,
            attachments: Vec::new(),
            embeds: Vec::new(),
            poll: None,
            reference: None,
        }
    }

    /// True when there is nothing that could be mirrored.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
            && self.poll.is_none()
            && self.embeds.is_empty()
            && self.attachments.is_empty()
    }

    /// Link that opens this message in the Discord client.
    pub fn jump_url(&self) -> String {
        format!(
            "https://discord.com/channels/{}/{}/{}",
            self.guild_id.as_deref().unwrap_or("@me"),
            self.channel_id,
            self.id
        )
    }

    /// All text that may carry mentions: content, embeds and poll.
    pub fn texts(&self) -> Vec<&str> {
        let mut texts = vec![self.content.as_str()];
        for embed in &self.embeds {
            texts.extend(embed.title.as_deref());
            texts.extend(embed.description.as_deref());
            for field in &embed.fields {
                texts.push(&field.name);
                texts.push(&field.value);
            }
            texts.extend(embed.footer.as_ref().map(|f| f.text.as_str()));
        }
        if let Some(poll) = &self.poll {
            texts.push(&poll.question);
            texts.extend(poll.answers.iter().map(String::as_str));
        }
        texts
    }
}

/// Something that may identify who wrote a message.
///
/// Implementors resolve in the order message, author, member: the first
/// source that knows the user wins.
pub trait HasAuthor {
    fn author_user(&self) -> Option<&User>;

    /// Username of the author, or `"unknown"`.
    fn username(&self) -> &str {
        self.author_user()
            .map(|user| user.username.as_str())
            .unwrap_or("unknown")
    }

    fn is_bot(&self) -> bool {
        self.author_user().is_some_and(|user| user.bot)
    }
}

impl HasAuthor for User {
    fn author_user(&self) -> Option<&User> {
        Some(self)
    }
}

impl HasAuthor for Member {
    fn author_user(&self) -> Option<&User> {
        self.user.as_ref()
    }
}

impl HasAuthor for SourceMessage {
    fn author_user(&self) -> Option<&User> {
        self.author
            .as_ref()
            .or_else(|| self.member.as_ref().and_then(HasAuthor::author_user))
    }
}

impl<T: HasAuthor> HasAuthor for Option<T> {
    fn author_user(&self) -> Option<&User> {
        self.as_ref().and_then(HasAuthor::author_user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user(name: &str, bot: bool) -> User {
        User {
            id: format!("{name}-id"),
            username: name.to_string(),
            global_name: None,
            bot,
        }
    }

    #[test]
    fn test_author_precedes_member() {
        let mut message = SourceMessage::new("1", "c");
        message.member = Some(Member {
            user: Some(user("member", false)),
            nick: None,
        });
        assert_eq!(message.username(), "member");

        message.author = Some(user("author", true));
        assert_eq!(message.username(), "author");
        assert!(message.is_bot());
    }

    #[test]
    fn test_unknown_author() {
        let message = SourceMessage::new("1", "c");
        assert_eq!(message.username(), "unknown");
        assert!(!message.is_bot());
        assert_eq!(None::<SourceMessage>.username(), "unknown");
    }

    #[test]
    fn test_display_name() {
        let mut u = user("plain", false);
        assert_eq!(u.display_name(), "plain");
        u.global_name = Some("Fancy".to_string());
        assert_eq!(u.display_name(), "Fancy");
        u.global_name = Some(String::new());
        assert_eq!(u.display_name(), "plain");
    }

    #[test]
    fn test_is_empty() {
        let mut message = SourceMessage::new("1", "c");
        assert!(message.is_empty());
        message.content = "  ".to_string();
        assert!(message.is_empty());
        message.attachments.push(Attachment {
            url: "https://cdn/x.png".to_string(),
            filename: None,
            content_type: Some("image/png".to_string()),
        });
        assert!(!message.is_empty());
        assert!(message.attachments[0].is_image());
    }

    #[test]
    fn test_jump_url() {
        let mut message = SourceMessage::new("3", "2");
        assert_eq!(message.jump_url(), "https://discord.com/channels/@me/2/3");
        message.guild_id = Some("1".to_string());
        assert_eq!(message.jump_url(), "https://discord.com/channels/1/2/3");
    }

    #[test]
    fn test_deserialize_ignores_unknown_fields() {
        let message: SourceMessage = serde_json::from_str(
            r#"{"id":"1","channel_id":"2","content":"hi","tts":false,
                "author":{"id":"9","username":"bob","bot":true,"avatar":null}}"#,
        )
        .unwrap();
        assert_eq!(message.content, "hi");
        assert_eq!(message.username(), "bob");
    }
}
