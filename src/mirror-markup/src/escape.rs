//! MarkdownV2 escaping.

/// Characters reserved by Telegram MarkdownV2 outside of code entities.
pub const RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Escape every reserved character that is not already escaped.
///
/// A character counts as escaped when it is preceded by an odd number of
/// backslashes, so `escape(&escape(s)) == escape(s)`.
pub fn escape(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for (i, &c) in chars.iter().enumerate() {
        if RESERVED.contains(&c) && !is_escaped(&chars, i) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Whether the code point at `pos` is preceded by an odd run of backslashes.
pub fn is_escaped(chars: &[char], pos: usize) -> bool {
    chars[..pos.min(chars.len())]
        .iter()
        .rev()
        .take_while(|&&c| c == '\\')
        .count()
        % 2
        == 1
}

/// Escape the content of a pre-formatted block, where only `\` and `` ` ``
/// are significant.
pub(crate) fn escape_code(text: &str) -> String {
    text.replace('\\', "\\\\").replace('`', "\\`")
}

/// Escape a link destination, where only `\` and `)` are significant.
pub(crate) fn escape_url(url: &str) -> String {
    url.replace('\\', "\\\\").replace(')', "\\)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_reserved() {
        assert_eq!(escape("a.b-c"), "a\\.b\\-c");
        assert_eq!(escape("(x)"), "\\(x\\)");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_escape_skips_escaped() {
        assert_eq!(escape("\\*star"), "\\*star");
        assert_eq!(escape("\\\\*"), "\\\\\\*");
    }

    #[test]
    fn test_escape_idempotent() {
        let samples = [
            "This is a test.",
            "\\\\\\*",
            "a\\b*c_d",
            "#🔔・𝙑𝙍-announcements",
            "trailing \\",
            "[[x]](y)!",
        ];
        for sample in samples {
            let once = escape(sample);
            assert_eq!(escape(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_escape_multibyte() {
        assert_eq!(escape("héllo wörld!"), "héllo wörld\\!");
        assert_eq!(escape("日本.語"), "日本\\.語");
    }

    #[test]
    fn test_is_escaped() {
        let chars: Vec<char> = "a\\*b\\\\*".chars().collect();
        assert!(is_escaped(&chars, 2));
        assert!(!is_escaped(&chars, 6));
        assert!(!is_escaped(&chars, 0));
    }

    #[test]
    fn test_escape_code_and_url() {
        assert_eq!(escape_code("a`b\\c"), "a\\`b\\\\c");
        assert_eq!(escape_url("http://x.y/(a)"), "http://x.y/(a\\)");
    }
}
