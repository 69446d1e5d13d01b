//! Clock abstraction and local-time interpretation.
//!
//! Every instant Tempo stores is UTC. Anything a user perceives ("today",
//! "2pm", business hours, weekdays) is interpreted through a [`TimeContext`],
//! which pairs the current instant with the configured UTC offset.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Timelike, Utc, Weekday,
};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a single instant (tests, replays).
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The current instant plus the user-facing UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeContext {
    now: DateTime<Utc>,
    offset: FixedOffset,
}

impl TimeContext {
    /// Build a context from an offset in minutes east of UTC.
    ///
    /// Out-of-range offsets (beyond +/- 24h) fall back to UTC.
    pub fn new(now: DateTime<Utc>, utc_offset_minutes: i32) -> Self {
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        Self { now, offset }
    }

    pub fn utc(now: DateTime<Utc>) -> Self {
        Self::new(now, 0)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local_now(&self) -> DateTime<FixedOffset> {
        self.now.with_timezone(&self.offset)
    }

    /// Today's date in the configured offset.
    pub fn today(&self) -> NaiveDate {
        self.local_now().date_naive()
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    /// Convert a local wall-clock reading to a UTC instant.
    ///
    /// Fixed offsets have no gaps or folds, so the mapping is always unique.
    pub fn from_local(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let shifted = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&shifted)
    }

    pub fn at(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        self.from_local(date.and_time(time))
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.to_local(instant).date_naive()
    }

    pub fn local_time(&self, instant: DateTime<Utc>) -> NaiveTime {
        self.to_local(instant).time()
    }

    pub fn local_hour(&self, instant: DateTime<Utc>) -> u32 {
        self.to_local(instant).hour()
    }

    pub fn local_weekday(&self, instant: DateTime<Utc>) -> Weekday {
        self.to_local(instant).weekday()
    }

    /// The next date (strictly after today) that falls on `weekday`.
    pub fn next_weekday(&self, weekday: Weekday) -> NaiveDate {
        let today = self.today();
        let current = i64::from(today.weekday().num_days_from_monday());
        let target = i64::from(weekday.num_days_from_monday());
        let mut ahead = (target - current + 7) % 7;
        if ahead == 0 {
            ahead = 7;
        }
        today + Duration::days(ahead)
    }

    /// Human-readable form used in replies, e.g. "Tuesday, March 05 at 02:00 PM".
    pub fn describe(&self, instant: DateTime<Utc>) -> String {
        self.to_local(instant)
            .format("%A, %B %d at %I:%M %p")
            .to_string()
    }

    pub fn describe_date(&self, instant: DateTime<Utc>) -> String {
        self.to_local(instant).format("%A, %B %d").to_string()
    }

    pub fn describe_time(&self, instant: DateTime<Utc>) -> String {
        self.to_local(instant).format("%I:%M %p").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_utc_context_today() {
        let ctx = TimeContext::utc(instant("2024-06-10T23:30:00Z"));
        assert_eq!(ctx.today(), NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
    }

    #[test]
    fn test_positive_offset_rolls_date_forward() {
        // 23:30 UTC is 01:30 the next day at UTC+2.
        let ctx = TimeContext::new(instant("2024-06-10T23:30:00Z"), 120);
        assert_eq!(ctx.today(), NaiveDate::from_ymd_opt(2024, 6, 11).unwrap());
        assert_eq!(ctx.local_hour(ctx.now()), 1);
    }

    #[test]
    fn test_from_local_inverts_offset() {
        let ctx = TimeContext::new(instant("2024-06-10T12:00:00Z"), -300);
        let local = NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert_eq!(ctx.from_local(local), instant("2024-06-10T14:00:00Z"));
    }

    #[test]
    fn test_invalid_offset_falls_back_to_utc() {
        let ctx = TimeContext::new(instant("2024-06-10T12:00:00Z"), 60 * 30);
        assert_eq!(ctx.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_next_weekday_skips_today() {
        // 2024-06-10 is a Monday.
        let ctx = TimeContext::utc(instant("2024-06-10T08:00:00Z"));
        assert_eq!(
            ctx.next_weekday(Weekday::Mon),
            NaiveDate::from_ymd_opt(2024, 6, 17).unwrap()
        );
        assert_eq!(
            ctx.next_weekday(Weekday::Wed),
            NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
        );
    }

    #[test]
    fn test_describe_format() {
        let ctx = TimeContext::utc(instant("2024-06-10T08:00:00Z"));
        assert_eq!(
            ctx.describe(instant("2024-06-11T14:00:00Z")),
            "Tuesday, June 11 at 02:00 PM"
        );
    }

    #[test]
    fn test_fixed_clock() {
        let at = instant("2024-01-01T00:00:00Z");
        assert_eq!(FixedClock(at).now(), at);
    }
}
