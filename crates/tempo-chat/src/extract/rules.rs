//! Pattern-based extraction of meeting details from free text.
//!
//! Everything here is local and infallible: unrecognized text simply yields
//! empty fields.

use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, NaiveTime, Weekday};
use regex::Regex;

use tempo_core::time::TimeContext;
use tempo_core::types::MeetingPatch;

use crate::types::MeetingRef;

// =============================================================================
// Compiled regex sets
// =============================================================================

struct TimePatterns {
    hm_meridiem: Regex,
    h_meridiem: Regex,
    hm_24: Regex,
    noon: Regex,
}

static TIME_PATTERNS: LazyLock<TimePatterns> = LazyLock::new(|| TimePatterns {
    hm_meridiem: Regex::new(r"(?i)\b(\d{1,2}):(\d{2})\s*([ap])\.?m\b\.?")
        .expect("Invalid time regex"),
    h_meridiem: Regex::new(r"(?i)\b(\d{1,2})\s*([ap])\.?m\b\.?").expect("Invalid time regex"),
    hm_24: Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)\b").expect("Invalid time regex"),
    noon: Regex::new(r"(?i)\bnoon\b").expect("Invalid time regex"),
});

struct DatePatterns {
    iso: Regex,
    tomorrow: Regex,
    today: Regex,
    weekday: Regex,
}

static DATE_PATTERNS: LazyLock<DatePatterns> = LazyLock::new(|| DatePatterns {
    iso: Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("Invalid date regex"),
    tomorrow: Regex::new(r"(?i)\btomorrow\b").expect("Invalid date regex"),
    today: Regex::new(r"(?i)\b(?:today|tonight)\b").expect("Invalid date regex"),
    weekday: Regex::new(
        r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday|mon|tue|tues|wed|thu|thur|thurs|fri|sat|sun)\b",
    )
    .expect("Invalid date regex"),
});

struct DurationPatterns {
    compound: Regex,
    half_hour: Regex,
    one_hour: Regex,
    hours: Regex,
    minutes: Regex,
}

static DURATION_PATTERNS: LazyLock<DurationPatterns> = LazyLock::new(|| DurationPatterns {
    compound: Regex::new(
        r"(?i)\b(\d+)\s*(?:hours?|hrs?|h)\s*(?:and\s+)?(\d+)\s*(?:minutes?|mins?|m)\b",
    )
    .expect("Invalid duration regex"),
    half_hour: Regex::new(r"(?i)\bhalf\s+(?:an\s+)?hour\b").expect("Invalid duration regex"),
    one_hour: Regex::new(r"(?i)\b(?:an|one)\s+hour\b").expect("Invalid duration regex"),
    hours: Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(?:hours?|hrs?)\b").expect("Invalid duration regex"),
    minutes: Regex::new(r"(?i)\b(\d+)\s*(?:minutes?|mins?)\b").expect("Invalid duration regex"),
});

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("Invalid email regex")
});

static WITH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bwith\s+(.+?)(?:\s+(?:on|at|for|about|regarding|tomorrow|today|tonight|next|this|from|to|in)\b|[.;!?]|$)",
    )
    .expect("Invalid participant regex")
});

static LIST_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(?:,|&|\band\b)\s*").expect("Invalid split regex"));

static TOPIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:about|regarding)\s+(.+?)(?:\s+(?:on|at|with|for|tomorrow|today|next)\b|[.;!?]|$)",
    )
    .expect("Invalid topic regex")
});

struct TitlePatterns {
    double_quoted: Regex,
    smart_quoted: Regex,
    single_quoted: Regex,
    before_meeting: Regex,
}

static TITLE_PATTERNS: LazyLock<TitlePatterns> = LazyLock::new(|| TitlePatterns {
    double_quoted: Regex::new(r#""([^"]+)""#).expect("Invalid title regex"),
    smart_quoted: Regex::new(r"\u{201C}([^\u{201D}]+)\u{201D}").expect("Invalid title regex"),
    single_quoted: Regex::new(r"(?:^|\s)'([^']+)'(?:\s|$|[.,!?])").expect("Invalid title regex"),
    before_meeting: Regex::new(r"(?i)\b((?:[A-Za-z0-9&'-]+\s+){1,2})meeting\b")
        .expect("Invalid title regex"),
});

/// Words that never form part of a title taken from "X meeting".
const TITLE_FILLER: &[&str] = &[
    "a", "an", "the", "my", "our", "your", "new", "another", "quick", "short", "this", "that",
    "schedule", "create", "book", "set", "up", "arrange", "organize", "organise", "plan", "for",
    "to", "with", "me", "us", "please", "minute", "minutes", "min", "hour", "hours", "one",
    "next", "tomorrow", "today", "tomorrow's", "today's",
];

static RENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:title|rename|name|call)\b[^"\u{201C}]*["\u{201C}]([^"\u{201D}]+)["\u{201D}]"#)
        .expect("Invalid rename regex")
});

static INDEX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:number|option|no\.?|#)?\s*(\d{1,3})\s*[.)]?\s*$").expect("Invalid index regex")
});

struct OrdinalPatterns {
    first: Regex,
    second: Regex,
    third: Regex,
    last: Regex,
}

static ORDINAL_PATTERNS: LazyLock<OrdinalPatterns> = LazyLock::new(|| OrdinalPatterns {
    first: Regex::new(r"(?i)\b(?:first|1st)\b").expect("Invalid ordinal regex"),
    second: Regex::new(r"(?i)\b(?:second|2nd)\b").expect("Invalid ordinal regex"),
    third: Regex::new(r"(?i)\b(?:third|3rd)\b").expect("Invalid ordinal regex"),
    last: Regex::new(r"(?i)\blast\b").expect("Invalid ordinal regex"),
});

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9']+").expect("Invalid word regex"));

/// Title words too generic to identify a meeting on their own.
const GENERIC_TITLE_WORDS: &[&str] = &["meeting", "call", "sync", "the", "and", "with", "for"];

// =============================================================================
// Extraction
// =============================================================================

/// Fields recognized in one utterance. Dates and times stay separate so the
/// caller can anchor a bare time to a date from earlier in the conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleExtraction {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub duration_minutes: Option<u32>,
    pub participants: Vec<String>,
    pub description: Option<String>,
}

impl RuleExtraction {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.date.is_none()
            && self.time.is_none()
            && self.duration_minutes.is_none()
            && self.participants.is_empty()
            && self.description.is_none()
    }
}

/// A time of day found in text, with its byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeMention {
    pub time: NaiveTime,
    pub position: usize,
    /// Preceded by "to" (as in "move it to 3pm").
    pub is_target: bool,
}

pub fn extract(text: &str, tz: &TimeContext) -> RuleExtraction {
    RuleExtraction {
        title: extract_title(text),
        date: extract_date(text, tz),
        time: time_mentions(text).first().map(|m| m.time),
        duration_minutes: extract_duration(text),
        participants: extract_participants(text),
        description: extract_topic(text),
    }
}

/// Every time of day in `text`, in order of appearance.
pub fn time_mentions(text: &str) -> Vec<TimeMention> {
    let pats = &*TIME_PATTERNS;
    let mut taken: Vec<(usize, usize)> = Vec::new();
    let mut found: Vec<(usize, NaiveTime)> = Vec::new();

    let mut accept = |start: usize, end: usize, time: Option<NaiveTime>| {
        if taken.iter().any(|&(s, e)| start < e && end > s) {
            return;
        }
        taken.push((start, end));
        if let Some(t) = time {
            found.push((start, t));
        }
    };

    for caps in pats.hm_meridiem.captures_iter(text) {
        let m = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
        let time = to_24h(&caps[1], Some(&caps[2]), &caps[3]);
        accept(m.0, m.1, time);
    }
    for caps in pats.h_meridiem.captures_iter(text) {
        let m = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
        let time = to_24h(&caps[1], None, &caps[2]);
        accept(m.0, m.1, time);
    }
    for caps in pats.hm_24.captures_iter(text) {
        let m = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
        let hour: u32 = caps[1].parse().unwrap_or(99);
        let minute: u32 = caps[2].parse().unwrap_or(99);
        accept(m.0, m.1, NaiveTime::from_hms_opt(hour, minute, 0));
    }
    for m in pats.noon.find_iter(text) {
        accept(m.start(), m.end(), NaiveTime::from_hms_opt(12, 0, 0));
    }

    found.sort_by_key(|(pos, _)| *pos);
    found
        .into_iter()
        .map(|(position, time)| {
            let before = text[..position].trim_end().to_lowercase();
            let is_target = before.ends_with(" to") || before == "to" || before.ends_with(" until");
            TimeMention {
                time,
                position,
                is_target,
            }
        })
        .collect()
}

fn to_24h(hour: &str, minute: Option<&str>, meridiem: &str) -> Option<NaiveTime> {
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = match minute {
        Some(m) => m.parse().ok()?,
        None => 0,
    };
    if !(1..=12).contains(&hour) {
        return None;
    }
    let pm = meridiem.eq_ignore_ascii_case("p");
    let hour = match (pm, hour) {
        (false, 12) => 0,
        (true, 12) => 12,
        (true, h) => h + 12,
        (false, h) => h,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// The first date reference: ISO date, "tomorrow", "today", or a weekday
/// (its next occurrence after today).
pub fn extract_date(text: &str, tz: &TimeContext) -> Option<NaiveDate> {
    let pats = &*DATE_PATTERNS;
    if let Some(caps) = pats.iso.captures(text) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }
    if pats.tomorrow.is_match(text) {
        return Some(tz.today() + Duration::days(1));
    }
    if pats.today.is_match(text) {
        return Some(tz.today());
    }
    let caps = pats.weekday.captures(text)?;
    parse_weekday(&caps[1]).map(|w| tz.next_weekday(w))
}

fn parse_weekday(word: &str) -> Option<Weekday> {
    let w = word.to_lowercase();
    let day = match &w[..3.min(w.len())] {
        "mon" => Weekday::Mon,
        "tue" => Weekday::Tue,
        "wed" => Weekday::Wed,
        "thu" => Weekday::Thu,
        "fri" => Weekday::Fri,
        "sat" => Weekday::Sat,
        "sun" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

/// Duration in minutes. The compound "N hours M minutes" form wins over
/// either unit on its own.
pub fn extract_duration(text: &str) -> Option<u32> {
    let pats = &*DURATION_PATTERNS;
    if let Some(caps) = pats.compound.captures(text) {
        let hours: u32 = caps[1].parse().ok()?;
        let minutes: u32 = caps[2].parse().ok()?;
        return positive(hours.saturating_mul(60).saturating_add(minutes));
    }
    if pats.half_hour.is_match(text) {
        return Some(30);
    }
    if let Some(caps) = pats.hours.captures(text) {
        let hours: f64 = caps[1].parse().ok()?;
        let minutes = (hours * 60.0).round();
        if minutes >= 1.0 && minutes <= f64::from(u32::MAX) {
            return Some(minutes as u32);
        }
        return None;
    }
    if pats.one_hour.is_match(text) {
        return Some(60);
    }
    let caps = pats.minutes.captures(text)?;
    caps[1].parse().ok().and_then(positive)
}

fn positive(minutes: u32) -> Option<u32> {
    (minutes > 0).then_some(minutes)
}

/// Email addresses when present; otherwise the names following "with".
pub fn extract_participants(text: &str) -> Vec<String> {
    let emails: Vec<String> = EMAIL_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    if !emails.is_empty() {
        return dedupe(emails);
    }

    let Some(caps) = WITH_RE.captures(text) else {
        return Vec::new();
    };
    let names = LIST_SPLIT_RE
        .split(caps[1].trim())
        .map(|n| n.trim().trim_start_matches("the ").trim())
        .filter(|n| !n.is_empty() && !n.eq_ignore_ascii_case("me"))
        .map(str::to_string)
        .collect();
    dedupe(names)
}

fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.iter().any(|o| o.eq_ignore_ascii_case(&item)) {
            out.push(item);
        }
    }
    out
}

fn extract_topic(text: &str) -> Option<String> {
    let caps = TOPIC_RE.captures(text)?;
    let topic = caps[1].trim();
    (topic.chars().count() > 2).then(|| topic.to_string())
}

/// A quoted string, else up to two words before "meeting" that are not
/// filler ("a", "the", "schedule", ...).
pub fn extract_title(text: &str) -> Option<String> {
    let pats = &*TITLE_PATTERNS;
    for re in [&pats.double_quoted, &pats.smart_quoted, &pats.single_quoted] {
        if let Some(caps) = re.captures(text) {
            let quoted = caps[1].trim();
            if !quoted.is_empty() {
                return Some(quoted.to_string());
            }
        }
    }

    let caps = pats.before_meeting.captures(text)?;
    let words: Vec<&str> = caps[1].split_whitespace().collect();
    let mut kept: Vec<&str> = Vec::new();
    for word in words.iter().rev() {
        let lower = word.to_lowercase();
        if TITLE_FILLER.contains(&lower.as_str()) || word.chars().all(|c| c.is_ascii_digit()) {
            break;
        }
        kept.push(word);
    }
    if kept.is_empty() {
        return None;
    }
    kept.reverse();
    Some(capitalize(&kept.join(" ")))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// =============================================================================
// Updates and meeting identification
// =============================================================================

/// Changes to `target` described in `text`. A time without a date keeps
/// the meeting's current date; values equal to the current ones are dropped.
pub fn extract_update(text: &str, target: &MeetingRef, tz: &TimeContext) -> MeetingPatch {
    let mut patch = MeetingPatch::default();

    let mentions = time_mentions(text);
    let time = mentions
        .iter()
        .rev()
        .find(|m| m.is_target)
        .or_else(|| mentions.last())
        .map(|m| m.time);
    let date = extract_date(text, tz);

    let start = match (date, time) {
        (None, None) => None,
        (d, t) => {
            let date = d.unwrap_or_else(|| tz.local_date(target.start_time));
            let time = t.unwrap_or_else(|| tz.local_time(target.start_time));
            Some(tz.at(date, time))
        }
    };
    patch.start_time = start.filter(|s| *s != target.start_time);
    patch.duration_minutes = extract_duration(text).filter(|d| *d != target.duration_minutes);
    patch.title = RENAME_RE
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|t| !t.is_empty() && *t != target.title);
    patch
}

/// Outcome of matching a reply against a list of meetings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Index(usize),
    /// A number was given but no meeting has it.
    OutOfRange,
    NoMatch,
}

/// Pick a meeting by 1-based number, title, time of day or ordinal word,
/// in that order. Times introduced by "to" or "until" are ignored.
pub fn identify_meeting(text: &str, candidates: &[MeetingRef], tz: &TimeContext) -> Selection {
    if candidates.is_empty() {
        return Selection::NoMatch;
    }

    if let Some(caps) = INDEX_RE.captures(text) {
        return match caps[1].parse::<usize>() {
            Ok(n) if (1..=candidates.len()).contains(&n) => Selection::Index(n - 1),
            _ => Selection::OutOfRange,
        };
    }

    if let Some(i) = match_title(text, candidates) {
        return Selection::Index(i);
    }

    // "to 4pm" names where a meeting goes, not which one.
    for mention in time_mentions(text).into_iter().filter(|m| !m.is_target) {
        if let Some(i) = candidates
            .iter()
            .position(|c| tz.local_time(c.start_time) == mention.time)
        {
            return Selection::Index(i);
        }
    }

    let pats = &*ORDINAL_PATTERNS;
    if pats.first.is_match(text) {
        return Selection::Index(0);
    }
    if pats.second.is_match(text) && candidates.len() >= 2 {
        return Selection::Index(1);
    }
    if pats.third.is_match(text) && candidates.len() >= 3 {
        return Selection::Index(2);
    }
    if pats.last.is_match(text) {
        return Selection::Index(candidates.len() - 1);
    }
    Selection::NoMatch
}

/// Full-title containment first; otherwise the candidate sharing the most
/// distinctive words with `text`.
fn match_title(text: &str, candidates: &[MeetingRef]) -> Option<usize> {
    let lower = text.to_lowercase();
    let text_words: Vec<String> = WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect();
    let padded = format!(" {} ", text_words.join(" "));

    let full = candidates
        .iter()
        .enumerate()
        .filter_map(|(i, c)| {
            let title = c.title.to_lowercase();
            let words: Vec<&str> = WORD_RE.find_iter(&title).map(|m| m.as_str()).collect();
            let phrase = words.join(" ");
            (phrase.len() >= 3 && padded.contains(&format!(" {} ", phrase))).then_some((i, phrase.len()))
        })
        .max_by_key(|(_, len)| *len)
        .map(|(i, _)| i);
    if full.is_some() {
        return full;
    }

    let mut best: Option<(usize, usize)> = None;
    for (i, c) in candidates.iter().enumerate() {
        let title = c.title.to_lowercase();
        let hits = WORD_RE
            .find_iter(&title)
            .map(|m| m.as_str())
            .filter(|w| w.len() >= 3 && !GENERIC_TITLE_WORDS.contains(w))
            .filter(|w| text_words.iter().any(|t| t == w))
            .count();
        if hits > 0 && best.map_or(true, |(_, h)| hits > h) {
            best = Some((i, hits));
        }
    }
    best.map(|(i, _)| i)
}

/// Title hint from free text, for matching against a model's target title.
pub fn find_by_title(title: &str, candidates: &[MeetingRef]) -> Option<usize> {
    match_title(title, candidates)
}
