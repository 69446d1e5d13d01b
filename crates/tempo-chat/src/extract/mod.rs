//! Meeting information extraction.
//!
//! Two sources feed a [`MeetingIntent`]: local pattern rules ([`rules`]) and
//! an optional structured reply from the completion service ([`model`]).
//! Model fields, when present and valid, take precedence.

pub mod model;
pub mod rules;

pub use model::{ExtractionPurpose, ModelExtraction, ModelFields};
pub use rules::{RuleExtraction, Selection};

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tempo_core::time::TimeContext;
use tempo_core::types::NewMeeting;

/// A field a meeting needs before it can be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingField {
    Title,
    DateTime,
    Participants,
    Duration,
}

impl MissingField {
    pub fn label(&self) -> &'static str {
        match self {
            MissingField::Title => "meeting title",
            MissingField::DateTime => "date and time",
            MissingField::Participants => "participants",
            MissingField::Duration => "duration",
        }
    }
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A partially described meeting, accumulated over one or more turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingIntent {
    pub title: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    /// A date mentioned without a time of day.
    pub date_hint: Option<NaiveDate>,
    pub duration_minutes: Option<u32>,
    pub participants: Vec<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

impl MeetingIntent {
    /// Required fields still absent, in prompt order.
    pub fn missing_fields(&self) -> Vec<MissingField> {
        let mut missing = Vec::new();
        if self.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
            missing.push(MissingField::Title);
        }
        if self.start_time.is_none() {
            missing.push(MissingField::DateTime);
        }
        if self.participants.is_empty() {
            missing.push(MissingField::Participants);
        }
        if self.duration_minutes.is_none() {
            missing.push(MissingField::Duration);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Merge rule output. A bare time lands on the date from this message,
    /// else the remembered date hint, else the current start date, else
    /// today. A bare date moves an existing start or is remembered.
    /// Returns whether anything changed.
    pub fn absorb_rules(&mut self, rules: &RuleExtraction, tz: &TimeContext) -> bool {
        let before = self.clone();

        if let Some(time) = rules.time {
            let date = rules
                .date
                .or(self.date_hint)
                .or_else(|| self.start_time.map(|s| tz.local_date(s)))
                .unwrap_or_else(|| tz.today());
            self.start_time = Some(tz.at(date, time));
            self.date_hint = None;
        } else if let Some(date) = rules.date {
            match self.start_time {
                Some(existing) => self.start_time = Some(tz.at(date, tz.local_time(existing))),
                None => self.date_hint = Some(date),
            }
        }

        if let Some(title) = &rules.title {
            self.title = Some(title.clone());
        }
        if let Some(duration) = rules.duration_minutes {
            self.duration_minutes = Some(duration);
        }
        self.add_participants(&rules.participants);
        if let Some(description) = &rules.description {
            self.description = Some(description.clone());
        }

        *self != before
    }

    /// Merge validated model fields over the current values.
    pub fn overlay(&mut self, fields: &ModelFields) -> bool {
        let before = self.clone();
        if let Some(title) = &fields.title {
            self.title = Some(title.clone());
        }
        if let Some(start) = fields.start_time {
            self.start_time = Some(start);
            self.date_hint = None;
        }
        if let Some(duration) = fields.duration_minutes {
            self.duration_minutes = Some(duration);
        }
        self.add_participants(&fields.participants);
        if let Some(description) = &fields.description {
            self.description = Some(description.clone());
        }
        if let Some(location) = &fields.location {
            self.location = Some(location.clone());
        }
        *self != before
    }

    fn add_participants(&mut self, incoming: &[String]) {
        for p in incoming {
            if !self.participants.iter().any(|q| q.eq_ignore_ascii_case(p)) {
                self.participants.push(p.clone());
            }
        }
    }

    /// Build the store input, if every required field is present.
    pub fn to_new_meeting(&self, organizer_id: &str) -> Option<NewMeeting> {
        let title = self.title.as_deref().filter(|t| !t.trim().is_empty())?;
        let start = self.start_time?;
        let duration = self.duration_minutes?;
        if self.participants.is_empty() {
            return None;
        }
        let mut meeting = NewMeeting::new(organizer_id, title.trim(), start, duration)
            .with_participants(self.participants.clone());
        if let Some(description) = &self.description {
            meeting.description = description.clone();
        }
        if let Some(location) = &self.location {
            meeting.location = location.clone();
        }
        Some(meeting)
    }
}
