//! Recursive scanner that turns preprocessed Discord markdown into [`Node`]s.
//!
//! The scanner walks Unicode code points left to right. At each position it
//! tries, in order: backslash escapes, sentinels, code fences, inline code,
//! links, two-character emphasis, line-leading headings and quotes, and
//! single-character emphasis. A position matching none of these becomes a
//! one-code-point text node, so every input character ends up in exactly one
//! leaf.

use crate::escape::is_escaped;
use crate::node::{Marker, Node};
use crate::timestamp::TimestampStyle;

pub(crate) const TIMESTAMP_PREFIX: &str = "[[TIMESTAMP:";
pub(crate) const MENTION_PREFIX: &str = "[[MENTION:";
pub(crate) const CHANNEL_PREFIX: &str = "[[CHANNEL:";
const SENTINEL_END: &str = "]]";
const FENCE: &str = "```";

const HEADINGS: [(&str, u8); 3] = [("### ", 3), ("## ", 2), ("# ", 1)];
const QUOTE: &str = "> ";

/// Parse preprocessed text into a node tree.
///
/// Parsing is total: malformed constructs degrade to literal text nodes.
pub fn parse(text: &str) -> Vec<Node> {
    let chars: Vec<char> = text.chars().collect();
    parse_chars(&chars)
}

fn parse_chars(input: &[char]) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut i = 0;

    while i < input.len() {
        if let Some((node, next)) = scan_at(input, i) {
            nodes.push(node);
            i = next;
        } else {
            nodes.push(Node::text(input[i]));
            i += 1;
        }
    }

    nodes
}

/// Try every construct at `pos`, returning the node and the position after it.
fn scan_at(input: &[char], pos: usize) -> Option<(Node, usize)> {
    let c = input[pos];

    if c == '\\' && pos + 1 < input.len() {
        let seq: String = input[pos..pos + 2].iter().collect();
        return Some((Node::raw(seq), pos + 2));
    }

    if c == '[' {
        if let Some(found) = scan_sentinel(input, pos) {
            return Some(found);
        }
    }

    if starts_with(input, pos, FENCE) {
        return Some(scan_code_block(input, pos));
    }

    if c == '`' {
        if let Some(end) = find_closing(input, pos + 1, "`") {
            let content = collect(&input[pos + 1..end]);
            return Some((Node::Code { content }, end + 1));
        }
    }

    if c == '[' {
        if let Some(found) = scan_link(input, pos) {
            return Some(found);
        }
    }

    for marker in Marker::DOUBLE {
        if let Some(found) = scan_formatting(input, pos, marker) {
            return Some(found);
        }
    }

    if at_line_start(input, pos) {
        for (prefix, level) in HEADINGS {
            if let Some((children, next)) = scan_line(input, pos, prefix) {
                return Some((Node::Heading { level, children }, next));
            }
        }
        if let Some((children, next)) = scan_line(input, pos, QUOTE) {
            return Some((Node::QuoteBlock { children }, next));
        }
    }

    for marker in Marker::SINGLE {
        if let Some(found) = scan_formatting(input, pos, marker) {
            return Some(found);
        }
    }

    None
}

fn scan_sentinel(input: &[char], pos: usize) -> Option<(Node, usize)> {
    if starts_with(input, pos, TIMESTAMP_PREFIX) {
        let start = pos + TIMESTAMP_PREFIX.len();
        let end = find_closing(input, start, SENTINEL_END)?;
        let body = collect(&input[start..end]);
        let (epoch, style) = body.split_once(':')?;
        let epoch_seconds = epoch.parse::<i64>().ok()?;
        let style = TimestampStyle::from_code(style)?;
        return Some((
            Node::Timestamp {
                epoch_seconds,
                style,
            },
            end + SENTINEL_END.len(),
        ));
    }

    for prefix in [MENTION_PREFIX, CHANNEL_PREFIX] {
        if starts_with(input, pos, prefix) {
            let start = pos + prefix.chars().count();
            let end = find_closing(input, start, SENTINEL_END)?;
            let text = collect(&input[start..end]);
            return Some((Node::Mention { text }, end + SENTINEL_END.len()));
        }
    }

    None
}

/// A fence without a closing fence swallows the rest of the input.
fn scan_code_block(input: &[char], pos: usize) -> (Node, usize) {
    let start = pos + FENCE.len();
    match find_closing(input, start, FENCE) {
        Some(end) => (
            Node::CodeBlock {
                content: collect(&input[start..end]),
            },
            end + FENCE.len(),
        ),
        None => (
            Node::CodeBlock {
                content: collect(&input[start..]),
            },
            input.len(),
        ),
    }
}

fn scan_link(input: &[char], pos: usize) -> Option<(Node, usize)> {
    let close_bracket = find_closing(input, pos + 1, "]")?;
    if input.get(close_bracket + 1) != Some(&'(') {
        return None;
    }
    let close_paren = find_closing(input, close_bracket + 2, ")")?;
    Some((
        Node::Link {
            text: collect(&input[pos + 1..close_bracket]),
            url: collect(&input[close_bracket + 2..close_paren]),
        },
        close_paren + 1,
    ))
}

fn scan_formatting(input: &[char], pos: usize, marker: Marker) -> Option<(Node, usize)> {
    let token = marker.source();
    if !starts_with(input, pos, token) {
        return None;
    }
    let width = token.len();
    let end = find_closing(input, pos + width, token)?;
    let children = parse_chars(&input[pos + width..end]);
    Some((Node::Formatting { marker, children }, end + width))
}

/// Parse `prefix ... \n`, consuming the newline. Lines without a terminating
/// newline are not matched.
fn scan_line(input: &[char], pos: usize, prefix: &str) -> Option<(Vec<Node>, usize)> {
    if !starts_with(input, pos, prefix) {
        return None;
    }
    let start = pos + prefix.len();
    let end = find_closing(input, start, "\n")?;
    Some((parse_chars(&input[start..end]), end + 1))
}

fn at_line_start(input: &[char], pos: usize) -> bool {
    pos == 0 || input[pos - 1] == '\n'
}

fn starts_with(input: &[char], pos: usize, token: &str) -> bool {
    let mut idx = pos;
    for expected in token.chars() {
        match input.get(idx) {
            Some(&c) if c == expected => idx += 1,
            _ => return false,
        }
    }
    true
}

/// Position of the first unescaped occurrence of `token` at or after `start`.
fn find_closing(input: &[char], start: usize, token: &str) -> Option<usize> {
    (start..input.len()).find(|&j| starts_with(input, j, token) && !is_escaped(input, j))
}

fn collect(chars: &[char]) -> String {
    chars.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fmt(marker: Marker, children: Vec<Node>) -> Node {
        Node::Formatting { marker, children }
    }

    fn texts(s: &str) -> Vec<Node> {
        s.chars().map(Node::text).collect()
    }

    #[test]
    fn test_plain_text_is_one_node_per_char() {
        assert_eq!(parse("ab"), texts("ab"));
        assert_eq!(parse("日本").len(), 2);
    }

    #[test]
    fn test_escape_is_raw() {
        assert_eq!(parse("\\*x"), vec![Node::raw("\\*"), Node::text('x')]);
    }

    #[test]
    fn test_trailing_backslash_is_text() {
        assert_eq!(parse("a\\"), vec![Node::text('a'), Node::text('\\')]);
    }

    #[test]
    fn test_double_before_single() {
        assert_eq!(parse("**b**"), vec![fmt(Marker::Bold, texts("b"))]);
        assert_eq!(parse("*i*"), vec![fmt(Marker::Italic, texts("i"))]);
    }

    #[test]
    fn test_unmatched_marker_is_literal() {
        assert_eq!(parse("**b"), texts("**b"));
    }

    #[test]
    fn test_closing_skips_escaped_marker() {
        let nodes = parse("*a\\*b*");
        assert_eq!(
            nodes,
            vec![fmt(
                Marker::Italic,
                vec![Node::text('a'), Node::raw("\\*"), Node::text('b')]
            )]
        );
    }

    #[test]
    fn test_inline_code_is_verbatim() {
        assert_eq!(
            parse("`*x*`"),
            vec![Node::Code {
                content: "*x*".to_string()
            }]
        );
    }

    #[test]
    fn test_unterminated_fence_consumes_rest() {
        assert_eq!(
            parse("a```b *c*"),
            vec![
                Node::text('a'),
                Node::CodeBlock {
                    content: "b *c*".to_string()
                }
            ]
        );
    }

    #[test]
    fn test_link() {
        assert_eq!(
            parse("[t](u)"),
            vec![Node::Link {
                text: "t".to_string(),
                url: "u".to_string()
            }]
        );
        assert_eq!(parse("[t] (u)")[0], Node::text('['));
    }

    #[test]
    fn test_sentinels() {
        assert_eq!(
            parse("[[TIMESTAMP:10:R]]"),
            vec![Node::Timestamp {
                epoch_seconds: 10,
                style: TimestampStyle::Relative
            }]
        );
        assert_eq!(
            parse("[[MENTION:@bob]]"),
            vec![Node::Mention {
                text: "@bob".to_string()
            }]
        );
        assert_eq!(
            parse("[[CHANNEL:#news]]"),
            vec![Node::Mention {
                text: "#news".to_string()
            }]
        );
    }

    #[test]
    fn test_malformed_sentinel_falls_through() {
        assert_eq!(parse("[[TIMESTAMP:abc:R]]")[0], Node::text('['));
        assert_eq!(parse("[[TIMESTAMP:10:x]]")[0], Node::text('['));
        assert_eq!(parse("[[MENTION:@bob")[0], Node::text('['));
    }

    #[test]
    fn test_heading_only_at_line_start() {
        assert_eq!(
            parse("# T\n"),
            vec![Node::Heading {
                level: 1,
                children: texts("T")
            }]
        );
        assert_eq!(
            parse("a\n### T\n")[2],
            Node::Heading {
                level: 3,
                children: texts("T")
            }
        );
        assert_eq!(parse("a # T\n"), texts("a # T\n"));
    }

    #[test]
    fn test_quote_needs_newline() {
        assert_eq!(
            parse("> q\n"),
            vec![Node::QuoteBlock {
                children: texts("q")
            }]
        );
        assert_eq!(parse("> q"), texts("> q"));
    }

    #[test]
    fn test_every_char_is_covered() {
        let input = "**b** _i_ `c` [l](u) x";
        fn width(node: &Node) -> usize {
            match node {
                Node::Text { content, .. } => content.chars().count(),
                Node::Formatting { marker, children } => {
                    2 * marker.source().len() + children.iter().map(width).sum::<usize>()
                }
                Node::Code { content } => content.chars().count() + 2,
                Node::Link { text, url } => text.chars().count() + url.chars().count() + 4,
                _ => 0,
            }
        }
        let total: usize = parse(input).iter().map(width).sum();
        assert_eq!(total, input.chars().count());
    }
}
