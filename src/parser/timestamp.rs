// Timestamp normalization. Feed mirrors render dates in several shapes;
// each strategy below handles one shape and they are tried in order.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Relative timestamps are a closed token grammar: a count, a unit word
/// from the list below, and an optional "ago". Anything else (months,
/// years, free text) is rejected rather than guessed at.
static RELATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d+)\s*(minutes?|mins?|m|hours?|hrs?|h|days?|d)(?:\s+ago)?$").unwrap()
});

const DOTTED_FORMATS: &[&str] = &[
    "%b %d, %Y %I:%M %p",
    "%b %d, %Y %H:%M:%S",
    "%b %d, %Y %H:%M",
];

const FALLBACK_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%b %d, %Y %I:%M %p",
    "%d %b %Y %H:%M",
];

const FALLBACK_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%b %d, %Y"];

/// Normalize a raw timestamp string to UTC. `now` anchors relative
/// phrases like "19m" or "2 hours ago". Returns `None` (logged) when no
/// strategy applies.
pub fn normalize(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parsed = absolute(trimmed)
        .or_else(|| dotted(trimmed))
        .or_else(|| relative(trimmed, now))
        .or_else(|| fallback(trimmed));

    if parsed.is_none() {
        tracing::warn!(timestamp = trimmed, "unable to normalize timestamp");
    }
    parsed
}

/// `21 May 2025, 19:03:45`
fn absolute(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%d %b %Y, %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// `May 21, 2025 · 7:03 PM UTC`, the shape nitter puts in title
/// attributes. Date and time sit either side of the middle dot.
fn dotted(raw: &str) -> Option<DateTime<Utc>> {
    let (date_part, time_part) = raw.split_once('·')?;
    let time_part = time_part
        .trim()
        .trim_end_matches(" UTC")
        .trim_end_matches(" GMT");
    let combined = format!("{} {}", date_part.trim(), time_part.trim());

    DOTTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&combined, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn relative(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let caps = RELATIVE_RE.captures(raw)?;
    let count: i64 = caps[1].parse().ok()?;
    let unit = caps[2].to_lowercase();

    let delta = match unit.as_str() {
        "m" | "min" | "mins" | "minute" | "minutes" => Duration::try_minutes(count)?,
        "h" | "hr" | "hrs" | "hour" | "hours" => Duration::try_hours(count)?,
        "d" | "day" | "days" => Duration::try_days(count)?,
        _ => return None,
    };

    now.checked_sub_signed(delta)
}

fn fallback(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Some(naive) = FALLBACK_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(naive.and_utc());
    }

    FALLBACK_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
