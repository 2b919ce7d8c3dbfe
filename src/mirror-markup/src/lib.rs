//! Discord markdown to Telegram MarkdownV2 transcoding.
//!
//! The pipeline has three stages:
//! - [`preprocess`] replaces Discord inline tags (timestamps, user/role/channel
//!   mentions, custom emojis) with sentinel markers so lookups happen once,
//!   before the recursive parse.
//! - [`parse`] scans the text code point by code point and builds a tree of
//!   [`Node`]s. Unmatched emphasis markers degrade to literal text.
//! - [`render`] serializes the tree into MarkdownV2, escaping reserved
//!   characters that are not already escaped.
//!
//! # Example
//!
//! ```rust
//! use mirror_markup::{transcode, NoResolver};
//!
//! assert_eq!(transcode("This is **bold text**", &NoResolver), "This is *bold text*");
//! assert_eq!(transcode("This is **bold text", &NoResolver), "This is \\*\\*bold text");
//! ```

pub mod escape;
pub mod node;
pub mod parser;
pub mod preprocess;
pub mod timestamp;

pub use escape::{escape, is_escaped};
pub use node::{Marker, Node, render, render_at};
pub use parser::parse;
pub use preprocess::{MentionIds, MentionResolver, MentionTable, NoResolver, collect_mentions, preprocess};
pub use timestamp::{TimestampStyle, format_timestamp, relative_phrase};

use chrono::{DateTime, Utc};

/// Transcode Discord-flavored text into Telegram MarkdownV2.
///
/// Runs preprocessing, parsing and rendering, then trims surrounding
/// whitespace from the result.
pub fn transcode(text: &str, resolver: &dyn MentionResolver) -> String {
    transcode_at(text, resolver, Utc::now())
}

/// Like [`transcode`], with relative timestamps anchored at `now`.
pub fn transcode_at(text: &str, resolver: &dyn MentionResolver, now: DateTime<Utc>) -> String {
    let mut text = preprocess(text, resolver);
    if !text.ends_with('\n') {
        text.push('\n');
    }
    let nodes = parse(&text);
    render_at(&nodes, now).trim().to_string()
}

/// Build the AST for `text` after preprocessing, without rendering it.
pub fn ast(text: &str, resolver: &dyn MentionResolver) -> Vec<Node> {
    parse(&preprocess(text, resolver))
}
