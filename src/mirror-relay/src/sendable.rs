//! Shaping a source message into a single target payload.

use chrono::{DateTime, Utc};
use mirror_markup::{MentionResolver, transcode};
use serde::{Deserialize, Serialize};

use crate::message::{Embed, HasAuthor, SourceMessage};

/// Payload handed to the target platform. All text is already MarkdownV2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sendable {
    Text {
        text: String,
    },
    Photo {
        url: String,
        caption: String,
    },
    Document {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        caption: String,
    },
    Poll {
        question: String,
        answers: Vec<String>,
        allow_multiselect: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expiry: Option<DateTime<Utc>>,
        /// Where to vote on the source platform.
        vote_url: String,
    },
}

impl Sendable {
    /// The main text of the payload: body, caption or poll question.
    pub fn text(&self) -> &str {
        match self {
            Sendable::Text { text } => text,
            Sendable::Photo { caption, .. } | Sendable::Document { caption, .. } => caption,
            Sendable::Poll { question, .. } => question,
        }
    }

    pub fn is_media(&self) -> bool {
        matches!(self, Sendable::Photo { .. } | Sendable::Document { .. })
    }
}

/// Build the payload for `message`, or `None` when there is nothing to send.
///
/// Precedence: poll, then the first embed carrying an image or thumbnail,
/// then all embeds as text, then the first attachment, then plain content.
pub fn shape(message: &SourceMessage, resolver: &dyn MentionResolver) -> Option<Sendable> {
    if message.is_empty() {
        return None;
    }
    let render = |text: &str| transcode(text, resolver);

    if let Some(poll) = &message.poll {
        return Some(Sendable::Poll {
            question: render(&poll.question),
            answers: poll.answers.iter().map(|a| render(a)).collect(),
            allow_multiselect: poll.allow_multiselect,
            expiry: poll.expiry,
            vote_url: message.jump_url(),
        });
    }

    let content = with_author_prefix(message);

    if !message.embeds.is_empty() {
        let pictured = message
            .embeds
            .iter()
            .find_map(|embed| embed.picture_url().map(|url| (embed, url)));
        if let Some((embed, url)) = pictured {
            return Some(Sendable::Photo {
                url: url.to_string(),
                caption: format_embed(embed, &render),
            });
        }
        return non_empty_text(format_embeds(&message.embeds, &render));
    }

    if let Some(attachment) = message.attachments.first() {
        let caption = render(&content);
        return Some(if attachment.is_image() {
            Sendable::Photo {
                url: attachment.url.clone(),
                caption,
            }
        } else {
            Sendable::Document {
                url: attachment.url.clone(),
                filename: attachment.filename.clone(),
                caption,
            }
        });
    }

    non_empty_text(render(&content))
}

fn non_empty_text(text: String) -> Option<Sendable> {
    if text.trim().is_empty() {
        None
    } else {
        Some(Sendable::Text { text })
    }
}

/// Prefix human-authored content with `*DisplayName*: `.
fn with_author_prefix(message: &SourceMessage) -> String {
    let Some(user) = message.author_user().filter(|u| !u.bot) else {
        return message.content.clone();
    };
    let name = user.display_name();
    if name.is_empty() {
        return message.content.clone();
    }
    let prefix = format!("*{name}*: ");
    if message.content.starts_with(&prefix) {
        message.content.clone()
    } else {
        format!("{prefix}{}", message.content)
    }
}

fn format_embed(embed: &Embed, render: &dyn Fn(&str) -> String) -> String {
    let mut out = String::new();
    if let Some(title) = embed.title.as_deref().filter(|t| !t.is_empty()) {
        out.push_str(&format!("*{}*\n", render(title)));
    }
    if let Some(description) = embed.description.as_deref().filter(|d| !d.is_empty()) {
        out.push_str(&format!("{}\n", render(description)));
    }
    for field in &embed.fields {
        out.push_str(&format!(
            "\n*{}:*\n{}\n",
            render(&field.name),
            render(&field.value)
        ));
    }
    if let Some(footer) = &embed.footer {
        out.push_str(&format!("\n_{}_", render(&footer.text)));
    }
    out
}

fn format_embeds(embeds: &[Embed], render: &dyn Fn(&str) -> String) -> String {
    embeds
        .iter()
        .map(|embed| format_embed(embed, render))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Attachment, EmbedField, EmbedFooter, EmbedMedia, Member, Poll, User};
    use mirror_markup::NoResolver;
    use pretty_assertions::assert_eq;

    fn message(content: &str) -> SourceMessage {
        let mut message = SourceMessage::new("10", "20");
        message.guild_id = Some("30".to_string());
        message.content = content.to_string();
        message
    }

    fn author(bot: bool) -> User {
        User {
            id: "1".to_string(),
            username: "alice".to_string(),
            global_name: Some("Alice".to_string()),
            bot,
        }
    }

    fn image(name: &str) -> Attachment {
        Attachment {
            url: format!("https://cdn.example/{name}"),
            filename: Some(name.to_string()),
            content_type: Some("image/png".to_string()),
        }
    }

    #[test]
    fn test_empty_message_has_nothing_to_send() {
        assert_eq!(shape(&message(""), &NoResolver), None);
    }

    #[test]
    fn test_emoji_only_message_has_nothing_to_send() {
        let mut m = message("<:pog:123>");
        m.author = Some(author(true));
        assert_eq!(shape(&m, &NoResolver), None);
    }

    #[test]
    fn test_plain_text_from_bot() {
        let mut m = message("Hello **world**.");
        m.author = Some(author(true));
        assert_eq!(
            shape(&m, &NoResolver),
            Some(Sendable::Text {
                text: "Hello *world*\\.".to_string()
            })
        );
    }

    #[test]
    fn test_human_author_gets_prefix_once() {
        let mut m = message("hi");
        m.author = Some(author(false));
        assert_eq!(shape(&m, &NoResolver).unwrap().text(), "_Alice_: hi");

        m.content = "*Alice*: hi".to_string();
        assert_eq!(shape(&m, &NoResolver).unwrap().text(), "_Alice_: hi");
    }

    #[test]
    fn test_member_author_gets_prefix() {
        let mut m = message("hi");
        m.member = Some(Member {
            user: Some(author(false)),
            nick: None,
        });
        assert_eq!(shape(&m, &NoResolver).unwrap().text(), "_Alice_: hi");
    }

    #[test]
    fn test_poll_wins() {
        let mut m = message("ignored");
        m.attachments.push(image("a.png"));
        m.poll = Some(Poll {
            question: "Best *fruit*?".to_string(),
            answers: vec!["apple".to_string(), "kiwi.".to_string()],
            expiry: None,
            allow_multiselect: true,
        });
        assert_eq!(
            shape(&m, &NoResolver),
            Some(Sendable::Poll {
                question: "Best _fruit_?".to_string(),
                answers: vec!["apple".to_string(), "kiwi\\.".to_string()],
                allow_multiselect: true,
                expiry: None,
                vote_url: "https://discord.com/channels/30/20/10".to_string(),
            })
        );
    }

    #[test]
    fn test_embed_picture_wins_over_attachment() {
        let mut m = message("body");
        m.author = Some(author(true));
        m.attachments.push(image("a.png"));
        m.embeds.push(Embed {
            title: Some("No picture".to_string()),
            ..Embed::default()
        });
        m.embeds.push(Embed {
            title: Some("Release 1.2".to_string()),
            description: Some("Notes".to_string()),
            fields: vec![EmbedField {
                name: "Changes".to_string(),
                value: "- fixed".to_string(),
                inline: false,
            }],
            footer: Some(EmbedFooter {
                text: "bot".to_string(),
            }),
            thumbnail: Some(EmbedMedia {
                url: "https://cdn.example/thumb.png".to_string(),
            }),
            ..Embed::default()
        });
        assert_eq!(
            shape(&m, &NoResolver),
            Some(Sendable::Photo {
                url: "https://cdn.example/thumb.png".to_string(),
                caption: "*Release 1\\.2*\nNotes\n\n*Changes:*\n\\- fixed\n\n_bot_".to_string(),
            })
        );
    }

    #[test]
    fn test_embeds_without_pictures_become_text() {
        let mut m = message("");
        m.embeds.push(Embed {
            title: Some("One".to_string()),
            ..Embed::default()
        });
        m.embeds.push(Embed {
            description: Some("Two".to_string()),
            ..Embed::default()
        });
        assert_eq!(
            shape(&m, &NoResolver),
            Some(Sendable::Text {
                text: "*One*\n\n\nTwo\n".to_string()
            })
        );
    }

    #[test]
    fn test_first_attachment_photo_or_document() {
        let mut m = message("see _this_");
        m.author = Some(author(true));
        m.attachments.push(image("a.png"));
        m.attachments.push(image("b.png"));
        assert_eq!(
            shape(&m, &NoResolver),
            Some(Sendable::Photo {
                url: "https://cdn.example/a.png".to_string(),
                caption: "see _this_".to_string(),
            })
        );

        m.attachments[0].content_type = Some("application/pdf".to_string());
        let doc = shape(&m, &NoResolver).unwrap();
        assert!(doc.is_media());
        assert!(matches!(doc, Sendable::Document { filename: Some(ref f), .. } if f == "a.png"));
    }
}
