//! Cell value formatters behind the built-in column types
//!
//! Every formatter is soft-failing: input it cannot interpret is rendered
//! unchanged instead of raising an error.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::sync::LazyLock;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

/// Pattern used by the `shortDateTimeFormat` column type
pub const SHORT_DATE_TIME_PATTERN: &str = "dd/MM/yyyy HH:mm";

/// Pattern used by the `customDateFormat` column type
pub const DATE_PATTERN: &str = "yyyy-MM-dd";

/// Plain text of a value as it would be shown without formatting
pub fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Numbers
// ─────────────────────────────────────────────────────────────────────────────

/// Interpret a cell as a float the way a lenient host would.
///
/// Strings are read up to the longest numeric prefix (`"12.5kg"` is `12.5`).
pub fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_float_prefix(s)?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let bytes = s.as_bytes();
    let mut best = None;

    while end < bytes.len() {
        let c = bytes[end];
        match c {
            b'+' | b'-' if end == 0 => {}
            b'+' | b'-' if seen_exp && matches!(bytes[end - 1], b'e' | b'E') => {}
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if seen_digit && !seen_exp => seen_exp = true,
            _ => break,
        }
        end += 1;
        if seen_digit {
            if let Ok(n) = s[..end].parse::<f64>() {
                best = Some(n);
            }
        }
    }
    best
}

/// Fixed-point rendering, e.g. `format_number(3.14159, 2) == "3.14"`
pub fn format_number(value: &Value, precision: usize) -> String {
    match parse_number(value) {
        Some(n) => format!("{n:.precision$}"),
        None => display_text(value),
    }
}

/// Currency rendering with thousands separators: `$1,234,567`
pub fn format_currency(value: &Value, symbol: &str, precision: usize) -> String {
    match parse_number(value) {
        Some(n) => format!("{symbol}{}", group_thousands(&format!("{n:.precision$}"))),
        None => display_text(value),
    }
}

/// Ratio rendered as a percentage: `0.1234` with precision 1 is `12.3%`
pub fn format_volatility(value: &Value, precision: usize) -> String {
    match parse_number(value) {
        Some(n) => format!("{:.precision$}%", n * 100.0),
        None => display_text(value),
    }
}

fn group_thousands(fixed: &str) -> String {
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dates
// ─────────────────────────────────────────────────────────────────────────────

/// Parse an ISO-8601 date or date-time.
///
/// Values carrying an offset keep it; naive values are treated as UTC wall time.
pub fn parse_iso_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    let utc = FixedOffset::east_opt(0)?;
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, pattern) {
            return naive.and_local_timezone(utc).single();
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| naive.and_local_timezone(utc).single())
}

/// Format an ISO date string with a date-fns style pattern (`dd/MM/yyyy HH:mm`).
pub fn format_date(value: &Value, pattern: &str) -> String {
    let Some(text) = value.as_str() else {
        return display_text(value);
    };
    let Some(dt) = parse_iso_datetime(text) else {
        return text.to_string();
    };

    let strftime = translate_date_pattern(pattern);
    let items: Vec<Item<'_>> = StrftimeItems::new(&strftime).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return text.to_string();
    }

    let mut out = String::new();
    match write!(out, "{}", dt.format_with_items(items.into_iter())) {
        Ok(()) => out,
        Err(_) => text.to_string(),
    }
}

/// Order a cell's ISO date against a filter date: `Greater` when the cell is later.
pub fn compare_iso_dates(cell: &str, filter: &str) -> Option<Ordering> {
    let cell = parse_iso_datetime(cell)?;
    let filter = parse_iso_datetime(filter)?;
    Some(cell.cmp(&filter))
}

/// Translate date-fns tokens (`yyyy`, `MM`, `dd`, `HH`, ...) to strftime.
///
/// Text inside single quotes is kept literally; unknown letters pass through.
pub fn translate_date_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && chars[i] == c {
            i += 1;
        }
        let run = i - start;

        let directive = match (c, run) {
            ('y', 2) => "%y",
            ('y', _) => "%Y",
            ('M', 1) => "%-m",
            ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', 1) => "%-d",
            ('d', _) => "%d",
            ('H', 1) => "%-H",
            ('H', _) => "%H",
            ('h', 1) => "%-I",
            ('h', _) => "%I",
            ('m', 1) => "%-M",
            ('m', _) => "%M",
            ('s', 1) => "%-S",
            ('s', _) => "%S",
            ('S', _) => "%3f",
            ('a', _) => "%p",
            ('E', 4..) => "%A",
            ('E', _) => "%a",
            ('x', _) | ('X', _) => "%:z",
            _ => {
                for _ in 0..run {
                    push_literal(&mut out, c);
                }
                continue;
            }
        };
        out.push_str(directive);
    }
    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Durations
// ─────────────────────────────────────────────────────────────────────────────

const MS_PER_SECOND: f64 = 1_000.0;
const MS_PER_MINUTE: f64 = 60.0 * MS_PER_SECOND;
const MS_PER_HOUR: f64 = 60.0 * MS_PER_MINUTE;
const MS_PER_DAY: f64 = 24.0 * MS_PER_HOUR;

static CLOCK_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([-+])?(?:(\d*)[. ])?(\d+):(\d+)(?::(\d+)(\.\d*)?)?$")
        .expect("Invalid clock duration regex")
});

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([-+])?P(?:([\d.]+)W)?(?:([\d.]+)D)?(?:T(?:([\d.]+)H)?(?:([\d.]+)M)?(?:([\d.]+)S)?)?$",
    )
    .expect("Invalid ISO duration regex")
});

/// Read a duration in milliseconds.
///
/// Accepts plain millisecond numbers, `[d.]hh:mm[:ss[.fff]]` clock strings and
/// ISO-8601 durations such as `P1DT2H30M`.
pub fn parse_duration_ms(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|ms| ms.is_finite()),
        Value::String(s) => parse_duration_text(s.trim()),
        _ => None,
    }
}

fn parse_duration_text(s: &str) -> Option<f64> {
    let part = |caps: &regex::Captures<'_>, i: usize| -> f64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0)
    };

    if let Some(caps) = CLOCK_DURATION.captures(s) {
        let sign = if caps.get(1).map(|m| m.as_str()) == Some("-") { -1.0 } else { 1.0 };
        let fraction = caps
            .get(6)
            .and_then(|m| format!("0{}", m.as_str()).parse::<f64>().ok())
            .unwrap_or(0.0);
        let ms = part(&caps, 2) * MS_PER_DAY
            + part(&caps, 3) * MS_PER_HOUR
            + part(&caps, 4) * MS_PER_MINUTE
            + (part(&caps, 5) + fraction) * MS_PER_SECOND;
        return Some(sign * ms);
    }

    if let Some(caps) = ISO_DURATION.captures(s) {
        if s.ends_with('P') || s.ends_with('T') {
            return None;
        }
        let sign = if caps.get(1).map(|m| m.as_str()) == Some("-") { -1.0 } else { 1.0 };
        let ms = part(&caps, 2) * 7.0 * MS_PER_DAY
            + part(&caps, 3) * MS_PER_DAY
            + part(&caps, 4) * MS_PER_HOUR
            + part(&caps, 5) * MS_PER_MINUTE
            + part(&caps, 6) * MS_PER_SECOND;
        return Some(sign * ms);
    }

    None
}

/// Relative, human phrasing of a duration: `in 5 minutes`, `2 days ago`.
pub fn humanize_duration(value: &Value) -> String {
    match parse_duration_ms(value) {
        Some(ms) => {
            let phrase = humanize_ms(ms.abs());
            if ms < 0.0 {
                format!("{phrase} ago")
            } else {
                format!("in {phrase}")
            }
        }
        None => display_text(value),
    }
}

fn humanize_ms(ms: f64) -> String {
    let seconds = (ms / MS_PER_SECOND).round();
    let minutes = (ms / MS_PER_MINUTE).round();
    let hours = (ms / MS_PER_HOUR).round();
    let days = (ms / MS_PER_DAY).round();
    // Average Gregorian month: 146097 days per 4800 months.
    let months = (ms / MS_PER_DAY * 4800.0 / 146_097.0).round();
    let years = (ms / MS_PER_DAY * 400.0 / 146_097.0).round();

    if seconds < 45.0 {
        "a few seconds".to_string()
    } else if minutes <= 1.0 {
        "a minute".to_string()
    } else if minutes < 45.0 {
        format!("{minutes} minutes")
    } else if hours <= 1.0 {
        "an hour".to_string()
    } else if hours < 22.0 {
        format!("{hours} hours")
    } else if days <= 1.0 {
        "a day".to_string()
    } else if days < 26.0 {
        format!("{days} days")
    } else if months <= 1.0 {
        "a month".to_string()
    } else if months < 11.0 {
        format!("{months} months")
    } else if years <= 1.0 {
        "a year".to_string()
    } else {
        format!("{years} years")
    }
}
