//! Replace Discord inline tags with parser sentinels.
//!
//! Mentions and timestamps need lookups or formatting that must not be
//! mistaken for emphasis, so they are rewritten to `[[...]]` sentinels before
//! the scanner runs.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::parser::{CHANNEL_PREFIX, MENTION_PREFIX, TIMESTAMP_PREFIX};
use crate::timestamp::TimestampStyle;

static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<t:(-?\d+)(?::([tTdDfFR]))?>").expect("valid regex"));
static USER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?(\d+)>").expect("valid regex"));
static ROLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@&(\d+)>").expect("valid regex"));
static CHANNEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<#(\d+)>").expect("valid regex"));
static EMOJI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<a?:\w+:\d+>").expect("valid regex"));

/// Looks up display names for ids referenced in message content.
pub trait MentionResolver {
    fn user(&self, id: &str) -> Option<String>;
    fn channel(&self, id: &str) -> Option<String>;
    fn role(&self, id: &str) -> Option<String>;
}

/// Resolver that knows no names; mentions render as raw ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl MentionResolver for NoResolver {
    fn user(&self, _id: &str) -> Option<String> {
        None
    }

    fn channel(&self, _id: &str) -> Option<String> {
        None
    }

    fn role(&self, _id: &str) -> Option<String> {
        None
    }
}

/// Static id to name tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MentionTable {
    pub users: HashMap<String, String>,
    pub channels: HashMap<String, String>,
    pub roles: HashMap<String, String>,
}

impl MentionTable {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.channels.is_empty() && self.roles.is_empty()
    }

    /// Copy entries from `other`, overwriting ids present in both.
    pub fn merge(&mut self, other: MentionTable) {
        self.users.extend(other.users);
        self.channels.extend(other.channels);
        self.roles.extend(other.roles);
    }
}

impl MentionResolver for MentionTable {
    fn user(&self, id: &str) -> Option<String> {
        self.users.get(id).cloned()
    }

    fn channel(&self, id: &str) -> Option<String> {
        self.channels.get(id).cloned()
    }

    fn role(&self, id: &str) -> Option<String> {
        self.roles.get(id).cloned()
    }
}

/// Ids referenced by a message, deduplicated and sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionIds {
    pub users: Vec<String>,
    pub channels: Vec<String>,
    pub roles: Vec<String>,
}

impl MentionIds {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.channels.is_empty() && self.roles.is_empty()
    }
}

/// List the user, channel and role ids mentioned in `text`.
pub fn collect_mentions(text: &str) -> MentionIds {
    let ids = |re: &Regex| -> Vec<String> {
        re.captures_iter(text)
            .map(|caps| caps[1].to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    };
    MentionIds {
        users: ids(&USER_RE),
        channels: ids(&CHANNEL_RE),
        roles: ids(&ROLE_RE),
    }
}

/// Rewrite timestamps and mentions to sentinels and drop custom emoji.
pub fn preprocess(text: &str, resolver: &dyn MentionResolver) -> String {
    let text = TIMESTAMP_RE.replace_all(text, |caps: &Captures| {
        let style = caps
            .get(2)
            .and_then(|m| TimestampStyle::from_code(m.as_str()))
            .unwrap_or(TimestampStyle::DEFAULT);
        format!("{TIMESTAMP_PREFIX}{}:{}]]", &caps[1], style.code())
    });
    let text = USER_RE.replace_all(&text, |caps: &Captures| {
        let name = resolver.user(&caps[1]).unwrap_or_else(|| caps[1].to_string());
        format!("{MENTION_PREFIX}@{name}]]")
    });
    let text = ROLE_RE.replace_all(&text, |caps: &Captures| {
        let name = resolver.role(&caps[1]).unwrap_or_else(|| caps[1].to_string());
        format!("{MENTION_PREFIX}@{name}]]")
    });
    let text = CHANNEL_RE.replace_all(&text, |caps: &Captures| {
        let name = resolver
            .channel(&caps[1])
            .unwrap_or_else(|| caps[1].to_string());
        format!("{CHANNEL_PREFIX}#{name}]]")
    });
    EMOJI_RE.replace_all(&text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> MentionTable {
        let mut table = MentionTable::default();
        table.users.insert("42".into(), "alice".into());
        table.channels.insert("7".into(), "news".into());
        table.roles.insert("9".into(), "mods".into());
        table
    }

    #[test]
    fn test_timestamps() {
        assert_eq!(
            preprocess("at <t:100:R>", &NoResolver),
            "at [[TIMESTAMP:100:R]]"
        );
        assert_eq!(preprocess("<t:100>", &NoResolver), "[[TIMESTAMP:100:f]]");
        assert_eq!(preprocess("<t:100:x>", &NoResolver), "<t:100:x>");
    }

    #[test]
    fn test_resolved_mentions() {
        assert_eq!(
            preprocess("<@42> <@!42> <@&9> <#7>", &table()),
            "[[MENTION:@alice]] [[MENTION:@alice]] [[MENTION:@mods]] [[CHANNEL:#news]]"
        );
    }

    #[test]
    fn test_unresolved_mentions_fall_back_to_id() {
        assert_eq!(
            preprocess("<@1> <#2> <@&3>", &NoResolver),
            "[[MENTION:@1]] [[CHANNEL:#2]] [[MENTION:@3]]"
        );
    }

    #[test]
    fn test_custom_emoji_removed() {
        assert_eq!(
            preprocess("hi <:wave:123> <a:spin:456>!", &NoResolver),
            "hi  !"
        );
    }

    #[test]
    fn test_collect_mentions() {
        let ids = collect_mentions("<@2> <@!1> <@2> <@&5> <#3> plain");
        assert_eq!(ids.users, vec!["1", "2"]);
        assert_eq!(ids.roles, vec!["5"]);
        assert_eq!(ids.channels, vec!["3"]);
        assert!(collect_mentions("none").is_empty());
    }

    #[test]
    fn test_merge_overwrites() {
        let mut base = table();
        let mut other = MentionTable::default();
        other.users.insert("42".into(), "bob".into());
        base.merge(other);
        assert_eq!(base.user("42").as_deref(), Some("bob"));
        assert_eq!(base.channel("7").as_deref(), Some("news"));
    }
}
