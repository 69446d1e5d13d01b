//! Slash commands for the interactive loop.
//!
//! `/suggest` and `/optimal` take the same arguments:
//! `<participants> [duration] [from] [to]` where participants are
//! comma-separated, duration is in minutes (default 60) and dates are
//! `YYYY-MM-DD` (default: today through a week from today).

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tempo_schedule::SlotQuery;

const DEFAULT_DURATION_MINUTES: u32 = 60;
const DEFAULT_RANGE_DAYS: i64 = 7;

/// Parsed arguments of a slot command.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotArgs {
    pub participants: Vec<String>,
    pub duration_minutes: u32,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl SlotArgs {
    /// Parse command arguments. `user` is always an attendee.
    pub fn parse(user: &str, args: &[&str], today: NaiveDate) -> Result<Self, String> {
        let mut participants = vec![user.to_string()];
        let listed = args
            .first()
            .ok_or_else(|| "usage: <participants> [minutes] [from YYYY-MM-DD] [to YYYY-MM-DD]".to_string())?;
        for name in listed.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if !participants.iter().any(|p| p == name) {
                participants.push(name.to_string());
            }
        }

        let duration_minutes = match args.get(1) {
            Some(raw) => match raw.parse::<u32>() {
                Ok(minutes) if minutes > 0 => minutes,
                _ => return Err(format!("invalid duration '{}'", raw)),
            },
            None => DEFAULT_DURATION_MINUTES,
        };

        let from = match args.get(2) {
            Some(raw) => parse_date(raw)?,
            None => today,
        };
        let to = match args.get(3) {
            Some(raw) => parse_date(raw)?,
            None => from + Duration::days(DEFAULT_RANGE_DAYS),
        };
        if to < from {
            return Err(format!("range ends ({}) before it starts ({})", to, from));
        }

        Ok(Self {
            participants,
            duration_minutes,
            from,
            to,
        })
    }

    /// Query over the parsed range, skipping slots that have already begun.
    pub fn query(&self, now: DateTime<Utc>) -> SlotQuery {
        SlotQuery::new(
            self.participants.clone(),
            self.duration_minutes,
            self.from,
            self.to,
        )
        .not_before(now)
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("invalid date '{}': {}", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 11).unwrap()
    }

    #[test]
    fn test_parse_defaults() {
        let args = SlotArgs::parse("alice", &["bob,carol"], today()).unwrap();
        assert_eq!(args.participants, vec!["alice", "bob", "carol"]);
        assert_eq!(args.duration_minutes, 60);
        assert_eq!(args.from, today());
        assert_eq!(args.to, NaiveDate::from_ymd_opt(2024, 6, 18).unwrap());
    }

    #[test]
    fn test_parse_full_arguments() {
        let args = SlotArgs::parse(
            "alice",
            &["alice, bob", "30", "2024-06-12", "2024-06-14"],
            today(),
        )
        .unwrap();
        assert_eq!(args.participants, vec!["alice", "bob"]);
        assert_eq!(args.duration_minutes, 30);
        assert_eq!(args.from, NaiveDate::from_ymd_opt(2024, 6, 12).unwrap());
        assert_eq!(args.to, NaiveDate::from_ymd_opt(2024, 6, 14).unwrap());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(SlotArgs::parse("alice", &[], today()).is_err());
        assert!(SlotArgs::parse("alice", &["bob", "0"], today()).is_err());
        assert!(SlotArgs::parse("alice", &["bob", "an hour"], today()).is_err());
        assert!(SlotArgs::parse("alice", &["bob", "30", "June 12"], today()).is_err());
        assert!(SlotArgs::parse("alice", &["bob", "30", "2024-06-14", "2024-06-12"], today()).is_err());
    }

    #[test]
    fn test_query_carries_range() {
        let args = SlotArgs::parse("alice", &["bob", "45"], today()).unwrap();
        let now = Utc::now();
        let query = args.query(now);
        assert_eq!(query.participants, vec!["alice", "bob"]);
        assert_eq!(query.duration_minutes, 45);
        assert_eq!(query.from, today());
        assert_eq!(query.not_before, Some(now));
    }
}
