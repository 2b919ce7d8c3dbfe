//! Discord timestamp styles rendered as readable UTC text.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::escape::escape;

/// Display style of a Discord `<t:EPOCH:S>` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimestampStyle {
    /// `t`: 9:41 PM
    #[serde(rename = "t")]
    ShortTime,
    /// `T`: 9:41:30 PM
    #[serde(rename = "T")]
    LongTime,
    /// `d`: 30/06/2023
    #[serde(rename = "d")]
    ShortDate,
    /// `D`: June 30, 2023
    #[serde(rename = "D")]
    LongDate,
    /// `f`: June 30, 2023 9:41 PM
    #[serde(rename = "f")]
    ShortDateTime,
    /// `F`: Friday, June 30, 2023 9:41 PM
    #[serde(rename = "F")]
    LongDateTime,
    /// `R`: 2 hours ago
    #[serde(rename = "R")]
    Relative,
}

impl TimestampStyle {
    /// Style used by Discord when the tag carries none.
    pub const DEFAULT: Self = Self::ShortDateTime;

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "t" => Some(Self::ShortTime),
            "T" => Some(Self::LongTime),
            "d" => Some(Self::ShortDate),
            "D" => Some(Self::LongDate),
            "f" => Some(Self::ShortDateTime),
            "F" => Some(Self::LongDateTime),
            "R" => Some(Self::Relative),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            Self::ShortTime => 't',
            Self::LongTime => 'T',
            Self::ShortDate => 'd',
            Self::LongDate => 'D',
            Self::ShortDateTime => 'f',
            Self::LongDateTime => 'F',
            Self::Relative => 'R',
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            Self::ShortTime => "%-I:%M %p UTC",
            Self::LongTime => "%-I:%M:%S %p UTC",
            Self::ShortDate => "%d/%m/%Y",
            Self::LongDate => "%B %d, %Y",
            Self::ShortDateTime | Self::Relative => "%B %d, %Y %-I:%M %p UTC",
            Self::LongDateTime => "%A, %B %d, %Y %-I:%M %p UTC",
        }
    }
}

/// Render `epoch_seconds` in `style` as escaped MarkdownV2.
///
/// Returns `None` when the epoch is outside the representable range.
pub fn format_timestamp(epoch_seconds: i64, style: TimestampStyle, now: DateTime<Utc>) -> Option<String> {
    let at = DateTime::<Utc>::from_timestamp(epoch_seconds, 0)?;
    let absolute = escape(&at.format(style.pattern()).to_string());
    match style {
        TimestampStyle::Relative => Some(format!(
            "*{}* \\({}\\)",
            escape(&relative_phrase(at, now)),
            absolute
        )),
        _ => Some(absolute),
    }
}

/// Human phrase for the distance between `at` and `now`.
pub fn relative_phrase(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(at);
    let future = diff < TimeDelta::zero();
    let diff = diff.abs();

    let amount = if diff < TimeDelta::minutes(1) {
        None
    } else if diff < TimeDelta::hours(1) {
        Some((diff.num_minutes(), "minute"))
    } else if diff < TimeDelta::days(1) {
        Some((diff.num_hours(), "hour"))
    } else if diff < TimeDelta::days(30) {
        Some((diff.num_days(), "day"))
    } else if diff < TimeDelta::days(365) {
        Some((diff.num_days() / 30, "month"))
    } else {
        Some((diff.num_days() / 365, "year"))
    };

    match (amount, future) {
        (None, true) => "in a few seconds".to_string(),
        (None, false) => "a few seconds ago".to_string(),
        (Some((n, unit)), true) => format!("in {}", plural(n, unit)),
        (Some((n, unit)), false) => format!("{} ago", plural(n, unit)),
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
