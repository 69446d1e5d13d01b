//! Schedule statistics and day-level insights.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use tempo_core::time::TimeContext;
use tempo_core::types::Meeting;

use crate::error::StoreError;
use crate::store::MeetingStore;

/// Gaps at least this long are reported as focus time.
pub const MIN_GAP_MINUTES: i64 = 30;
/// Meetings at most this far apart count as back-to-back.
pub const BACK_TO_BACK_MINUTES: i64 = 5;
/// Meetings longer than this are flagged.
pub const LONG_MEETING_MINUTES: u32 = 120;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BucketStats {
    pub count: usize,
    pub total_minutes: u64,
}

/// Aggregate numbers over a set of meetings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeetingAnalytics {
    pub total_meetings: usize,
    pub total_minutes: u64,
    pub average_minutes: f64,
    /// Keyed by local weekday name ("Monday", ...).
    pub by_weekday: BTreeMap<String, BucketStats>,
    /// Keyed by local start hour.
    pub by_hour: BTreeMap<u32, BucketStats>,
}

/// Something worth pointing out about a day's schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleInsight {
    Gap {
        after: Uuid,
        before: Uuid,
        start: DateTime<Utc>,
        minutes: i64,
    },
    BackToBack {
        first: Uuid,
        second: Uuid,
        minutes_between: i64,
    },
    LongMeeting {
        meeting_id: Uuid,
        title: String,
        minutes: u32,
    },
}

impl ScheduleInsight {
    pub fn describe(&self, tz: &TimeContext) -> String {
        match self {
            ScheduleInsight::Gap { start, minutes, .. } => format!(
                "{} minutes free from {}, good for focused work",
                minutes,
                tz.describe_time(*start)
            ),
            ScheduleInsight::BackToBack {
                minutes_between, ..
            } => format!(
                "Back-to-back meetings with only {} minutes in between",
                minutes_between
            ),
            ScheduleInsight::LongMeeting { title, minutes, .. } => {
                format!("'{}' runs {} minutes, consider splitting it", title, minutes)
            }
        }
    }
}

/// Compute totals and weekday/hour distributions. Cancelled meetings are skipped.
pub fn summarize(meetings: &[Meeting], tz: &TimeContext) -> MeetingAnalytics {
    let mut stats = MeetingAnalytics::default();
    for m in meetings.iter().filter(|m| m.status.is_active()) {
        let minutes = u64::from(m.duration_minutes);
        stats.total_meetings += 1;
        stats.total_minutes += minutes;

        let day = tz.local_weekday(m.start_time);
        let entry = stats.by_weekday.entry(weekday_name(day).to_string()).or_default();
        entry.count += 1;
        entry.total_minutes += minutes;

        let entry = stats.by_hour.entry(tz.local_hour(m.start_time)).or_default();
        entry.count += 1;
        entry.total_minutes += minutes;
    }
    if stats.total_meetings > 0 {
        stats.average_minutes = stats.total_minutes as f64 / stats.total_meetings as f64;
    }
    stats
}

/// Gaps, back-to-back pairs and long meetings among `meetings` on `date`.
pub fn insights_for_day(meetings: &[Meeting], date: NaiveDate, tz: &TimeContext) -> Vec<ScheduleInsight> {
    let mut day: Vec<&Meeting> = meetings
        .iter()
        .filter(|m| m.status.is_active() && tz.local_date(m.start_time) == date)
        .collect();
    day.sort_by_key(|m| m.start_time);

    let mut out = Vec::new();
    for pair in day.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let between = (b.start_time - a.end_time).num_minutes();
        if between >= MIN_GAP_MINUTES {
            out.push(ScheduleInsight::Gap {
                after: a.id,
                before: b.id,
                start: a.end_time,
                minutes: between,
            });
        } else if (0..=BACK_TO_BACK_MINUTES).contains(&between) {
            out.push(ScheduleInsight::BackToBack {
                first: a.id,
                second: b.id,
                minutes_between: between,
            });
        }
    }
    for m in &day {
        if m.duration_minutes > LONG_MEETING_MINUTES {
            out.push(ScheduleInsight::LongMeeting {
                meeting_id: m.id,
                title: m.title.clone(),
                minutes: m.duration_minutes,
            });
        }
    }
    out
}

/// Analytics over the user's meetings starting in `[from, to]` (local dates).
pub async fn meeting_analytics(
    store: &dyn MeetingStore,
    user_id: &str,
    from: NaiveDate,
    to: NaiveDate,
    tz: &TimeContext,
) -> Result<MeetingAnalytics, StoreError> {
    let start = tz.at(from, chrono::NaiveTime::default());
    let end = tz.at(to, chrono::NaiveTime::default()) + Duration::days(1);
    let meetings: Vec<Meeting> = store
        .list_for_user(user_id, None)
        .await?
        .into_iter()
        .filter(|m| m.start_time >= start && m.start_time < end)
        .collect();
    Ok(summarize(&meetings, tz))
}

/// Insights for one local date of the user's schedule.
pub async fn schedule_insights(
    store: &dyn MeetingStore,
    user_id: &str,
    date: NaiveDate,
    tz: &TimeContext,
) -> Result<Vec<ScheduleInsight>, StoreError> {
    let meetings = store.list_for_user(user_id, None).await?;
    Ok(insights_for_day(&meetings, date, tz))
}

fn weekday_name(day: chrono::Weekday) -> &'static str {
    match day {
        chrono::Weekday::Mon => "Monday",
        chrono::Weekday::Tue => "Tuesday",
        chrono::Weekday::Wed => "Wednesday",
        chrono::Weekday::Thu => "Thursday",
        chrono::Weekday::Fri => "Friday",
        chrono::Weekday::Sat => "Saturday",
        chrono::Weekday::Sun => "Sunday",
    }
}
