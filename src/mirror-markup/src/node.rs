//! AST nodes and their MarkdownV2 serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::escape::{escape, escape_code, escape_url};
use crate::timestamp::{TimestampStyle, format_timestamp};

/// Emphasis marker in the source dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    /// `**`
    Bold,
    /// `__`
    Underline,
    /// `||`
    Spoiler,
    /// `~~`
    Strikethrough,
    /// `*`
    Italic,
    /// `_`
    Underscore,
}

impl Marker {
    /// Two-character markers, tried before single-character ones.
    pub const DOUBLE: [Marker; 4] = [Self::Bold, Self::Underline, Self::Spoiler, Self::Strikethrough];
    pub const SINGLE: [Marker; 2] = [Self::Italic, Self::Underscore];

    /// Token as written in Discord markdown.
    pub fn source(self) -> &'static str {
        match self {
            Self::Bold => "**",
            Self::Underline => "__",
            Self::Spoiler => "||",
            Self::Strikethrough => "~~",
            Self::Italic => "*",
            Self::Underscore => "_",
        }
    }

    /// Wrapper emitted in Telegram MarkdownV2.
    pub fn target(self) -> &'static str {
        match self {
            Self::Bold => "*",
            Self::Underline => "__",
            Self::Spoiler => "||",
            Self::Strikethrough => "~",
            Self::Italic | Self::Underscore => "_",
        }
    }
}

/// A node of the parsed message tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Literal text. `raw` text is an escape sequence copied through as-is.
    Text { content: String, raw: bool },
    Formatting { marker: Marker, children: Vec<Node> },
    Code { content: String },
    CodeBlock { content: String },
    Link { text: String, url: String },
    /// A resolved user, role or channel mention, e.g. `@name` or `#name`.
    Mention { text: String },
    Timestamp { epoch_seconds: i64, style: TimestampStyle },
    Heading { level: u8, children: Vec<Node> },
    QuoteBlock { children: Vec<Node> },
}

impl Node {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
            raw: false,
        }
    }

    pub fn raw(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
            raw: true,
        }
    }

    /// Append this node's MarkdownV2 form to `out`.
    ///
    /// `now` anchors relative timestamps.
    pub fn write_to(&self, out: &mut String, now: DateTime<Utc>) {
        match self {
            Node::Text { content, raw: true } => out.push_str(content),
            Node::Text { content, raw: false } => out.push_str(&escape(content)),
            Node::Formatting { marker, children } => {
                out.push_str(marker.target());
                write_all(children, out, now);
                out.push_str(marker.target());
            }
            Node::Code { content } => {
                out.push('`');
                out.push_str(content);
                out.push('`');
            }
            Node::CodeBlock { content } => {
                out.push_str("```");
                out.push_str(&escape_code(content));
                out.push_str("```");
            }
            Node::Link { text, url } => {
                out.push('[');
                out.push_str(&escape(text));
                out.push_str("](");
                out.push_str(&escape_url(url));
                out.push(')');
            }
            Node::Mention { text } => out.push_str(&escape(text)),
            Node::Timestamp {
                epoch_seconds,
                style,
            } => match format_timestamp(*epoch_seconds, *style, now) {
                Some(formatted) => out.push_str(&formatted),
                None => out.push_str(&escape(&format!(
                    "[[TIMESTAMP:{}:{}]]",
                    epoch_seconds,
                    style.code()
                ))),
            },
            Node::Heading { level, children } => match level {
                1 => {
                    out.push_str(">*");
                    write_all(&unwrap_edge_bold(children), out, now);
                    out.push_str("*\n");
                }
                2 => {
                    out.push('>');
                    write_all(children, out, now);
                    out.push('\n');
                }
                3 => {
                    out.push('*');
                    write_all(&unwrap_edge_bold(children), out, now);
                    out.push_str("*\n");
                }
                _ => write_all(children, out, now),
            },
            Node::QuoteBlock { children } => {
                out.push('>');
                write_all(children, out, now);
                out.push('\n');
            }
        }
    }
}

/// Heading children with a leading or trailing bold run replaced by its
/// contents, since the heading is already emitted bold.
fn unwrap_edge_bold(children: &[Node]) -> Vec<Node> {
    let is_bold = |node: Option<&Node>| {
        matches!(
            node,
            Some(Node::Formatting {
                marker: Marker::Bold,
                ..
            })
        )
    };

    let mut nodes = children.to_vec();
    if is_bold(nodes.last()) {
        if let Some(Node::Formatting { children, .. }) = nodes.pop() {
            nodes.extend(children);
        }
    }
    if is_bold(nodes.first()) {
        if let Node::Formatting { children, .. } = nodes.remove(0) {
            nodes.splice(0..0, children);
        }
    }
    nodes
}

fn write_all(nodes: &[Node], out: &mut String, now: DateTime<Utc>) {
    for node in nodes {
        node.write_to(out, now);
    }
}

/// Render nodes as MarkdownV2 using the current wall-clock time.
pub fn render(nodes: &[Node]) -> String {
    render_at(nodes, Utc::now())
}

/// Render nodes as MarkdownV2 with relative timestamps anchored at `now`.
pub fn render_at(nodes: &[Node], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    write_all(nodes, &mut out, now);
    out
}
