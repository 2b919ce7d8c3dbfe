//! End-to-end transcoding tests.

use chrono::{DateTime, TimeDelta, Utc};
use mirror_markup::{MentionTable, NoResolver, Node, escape, render, transcode, transcode_at};
use pretty_assertions::assert_eq;

struct Case {
    name: &'static str,
    input: &'static str,
    expected: &'static str,
}

const CASES: &[Case] = &[
    Case {
        name: "unclosed bold",
        input: "This is **bold text",
        expected: "This is \\*\\*bold text",
    },
    Case {
        name: "balanced bold",
        input: "This is **bold text**",
        expected: "This is *bold text*",
    },
    Case {
        name: "unclosed italic",
        input: "This is _italic text *italic text",
        expected: "This is \\_italic text \\*italic text",
    },
    Case {
        name: "balanced italic",
        input: "This is _italic text_ *italic text*",
        expected: "This is _italic text_ _italic text_",
    },
    Case {
        name: "broken formatting",
        input: "*bold _italic",
        expected: "\\*bold \\_italic",
    },
    Case {
        name: "nested balanced formatting",
        input: "**bold* _italic_**",
        expected: "*bold\\* _italic_*",
    },
    Case {
        name: "inline code unclosed",
        input: "Some `code",
        expected: "Some \\`code",
    },
    Case {
        name: "escaped star",
        input: "*Escape \\*star*",
        expected: "_Escape \\*star_",
    },
    Case {
        name: "code block unchanged",
        input: "```\ncode block\n```",
        expected: "```\ncode block\n```",
    },
    Case {
        name: "strikethrough",
        input: "This is ~~strikethrough~~ and this is ~not~",
        expected: "This is ~strikethrough~ and this is \\~not\\~",
    },
    Case {
        name: "mixed formatting",
        input: "*bold _italic ~strike",
        expected: "\\*bold \\_italic \\~strike",
    },
    Case {
        name: "unclosed formatting tokens",
        input: "This is _italic and *bold",
        expected: "This is \\_italic and \\*bold",
    },
    Case {
        name: "url",
        input: "This is [an example](http://www.example.com/) link.",
        expected: "This is [an example](http://www.example.com/) link\\.",
    },
    Case {
        name: "mixed markdown with code block",
        input: "Here is some code: ```go \nfmt.Println(\"Hello\")\n``` and some *bold",
        expected: "Here is some code: ```go \nfmt.Println(\"Hello\")\n``` and some \\*bold",
    },
    Case {
        name: "italic underline",
        input: "_italic __underlined___",
        expected: "_italic __underlined___",
    },
    Case {
        name: "spoiler",
        input: "||hidden|| in plain sight",
        expected: "||hidden|| in plain sight",
    },
    Case {
        name: "heading",
        input: "# Title\nbody",
        expected: ">*Title*\nbody",
    },
    Case {
        name: "heading ending in escaped star",
        input: "# price 5\\*\nbody",
        expected: ">*price 5\\**\nbody",
    },
    Case {
        name: "bold heading",
        input: "# **Title**\nbody",
        expected: ">*Title*\nbody",
    },
    Case {
        name: "small heading",
        input: "### Notes\nbody",
        expected: "*Notes*\nbody",
    },
    Case {
        name: "quote",
        input: "> quoted\nnext",
        expected: ">quoted\nnext",
    },
    Case {
        name: "custom emoji removed",
        input: "gg <:pog:123456>",
        expected: "gg",
    },
];

#[test]
fn test_transcode_table() {
    for case in CASES {
        assert_eq!(
            transcode(case.input, &NoResolver),
            case.expected,
            "case: {}",
            case.name
        );
    }
}

#[test]
fn test_combined_example() {
    let input = concat!(
        "**bold \\*text**\n",
        "*italic \\*text*\n",
        "__underline__\n",
        "~~strikethrough~~\n",
        "||spoiler||\n",
        "**bold _italic bold ~~italic bold strikethrough ||italic bold strikethrough spoiler||~~ __underline italic bold___ bold**\n",
        "[inline URL](http://www.example.com/)\n",
        "`inline fixed-width code`",
        "```\npre-formatted fixed-width code block\n```\n",
        "```python\npre-formatted fixed-width code block written in the Python programming language\n```",
    );
    let expected = concat!(
        "*bold \\*text*\n",
        "_italic \\*text_\n",
        "__underline__\n",
        "~strikethrough~\n",
        "||spoiler||\n",
        "*bold _italic bold ~italic bold strikethrough ||italic bold strikethrough spoiler||~ __underline italic bold___ bold*\n",
        "[inline URL](http://www.example.com/)\n",
        "`inline fixed-width code`",
        "```\npre-formatted fixed-width code block\n```\n",
        "```python\npre-formatted fixed-width code block written in the Python programming language\n```",
    );
    assert_eq!(transcode(input, &NoResolver), expected);
}

#[test]
fn test_channel_mention_is_escaped() {
    let mut table = MentionTable::default();
    table
        .channels
        .insert("1335581350731972648".into(), "🔔・𝙑𝙍-announcements".into());
    assert_eq!(
        transcode("This is a channel <#1335581350731972648> testing", &table),
        "This is a channel \\#🔔・𝙑𝙍\\-announcements testing"
    );
}

#[test]
fn test_unresolved_mentions_use_ids() {
    assert_eq!(
        transcode("<@1234567890> <@!123456789>", &NoResolver),
        "@1234567890 @123456789"
    );
}

#[test]
fn test_user_mention_inside_bold() {
    let mut table = MentionTable::default();
    table.users.insert("5".into(), "some_user".into());
    assert_eq!(transcode("**hi <@5>**", &table), "*hi @some\\_user*");
}

#[test]
fn test_timestamps() {
    let epoch = 1_688_161_290;
    let now = DateTime::<Utc>::from_timestamp(epoch, 0).unwrap() + TimeDelta::hours(2);

    assert_eq!(
        transcode_at("<t:1688161290:F>", &NoResolver, now),
        "Friday, June 30, 2023 9:41 PM UTC"
    );
    assert_eq!(
        transcode_at("on <t:1688161290:d>.", &NoResolver, now),
        "on 30/06/2023\\."
    );
    assert_eq!(
        transcode_at("<t:1688161290:R>", &NoResolver, now),
        "*2 hours ago* \\(June 30, 2023 9:41 PM UTC\\)"
    );
}

#[test]
fn test_out_of_range_timestamp_degrades_to_sentinel() {
    assert_eq!(
        transcode("<t:99999999999999999:t>", &NoResolver),
        "\\[\\[TIMESTAMP:99999999999999999:t\\]\\]"
    );
}

#[test]
fn test_multibyte_text_is_preserved() {
    assert_eq!(
        transcode("**日本語** und *grüße*!", &NoResolver),
        "*日本語* und _grüße_\\!"
    );
}

#[test]
fn test_escape_is_idempotent() {
    let samples = [
        "",
        "plain",
        "a.b-c!",
        "\\*already\\*",
        "\\\\*",
        "mixed \\_ and _",
        "🔔・𝙑𝙍-announcements",
        "((nested)) [brackets] {braces}",
    ];
    for sample in samples {
        let once = escape(sample);
        assert_eq!(escape(&once), once, "sample: {sample:?}");
    }
}

#[test]
fn test_inline_code_round_trip() {
    let samples = ["", "x", "a.b*c_d", "#!/bin/sh", "(1 + 2) = 3", "\\n", "日本"];
    for sample in samples {
        let node = Node::Code {
            content: sample.to_string(),
        };
        assert_eq!(render(&[node]), format!("`{sample}`"));
    }
}

#[test]
fn test_transcode_is_deterministic() {
    let input = "**a** _b_ ~~c~~ `d` [e](f) > g";
    assert_eq!(transcode(input, &NoResolver), transcode(input, &NoResolver));
}
