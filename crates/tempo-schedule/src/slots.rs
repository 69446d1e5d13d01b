//! Business-hours slot search across participants.
//!
//! Candidates are enumerated chronologically over an inclusive date range,
//! filtered for feasibility against every participant's bookings, then
//! ranked by a fixed heuristic score.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use serde::Serialize;

use tempo_core::config::ScheduleConfig;
use tempo_core::time::TimeContext;

use crate::conflict::{BusySnapshot, ConflictDetector};
use crate::error::StoreError;

/// A feasible slot with its ranking score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSlotCandidate {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub participant_count: usize,
    pub score: f64,
}

/// Local hours during which candidates may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessWindow {
    pub start_hour: u32,
    /// Exclusive.
    pub end_hour: u32,
    pub step_minutes: u32,
}

impl Default for BusinessWindow {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
            step_minutes: 60,
        }
    }
}

impl From<&ScheduleConfig> for BusinessWindow {
    fn from(config: &ScheduleConfig) -> Self {
        Self {
            start_hour: config.business_start_hour,
            end_hour: config.business_end_hour,
            step_minutes: config.slot_step_minutes.max(1),
        }
    }
}

impl BusinessWindow {
    /// Candidate start times of day, in order.
    pub fn start_times(&self) -> Vec<NaiveTime> {
        let first = self.start_hour * 60;
        let last = self.end_hour.min(24) * 60;
        let step = self.step_minutes.max(1) as usize;
        (first..last)
            .step_by(step)
            .filter_map(|m| NaiveTime::from_hms_opt(m / 60, m % 60, 0))
            .collect()
    }
}

/// What to search for.
#[derive(Debug, Clone)]
pub struct SlotQuery {
    pub participants: Vec<String>,
    pub duration_minutes: u32,
    /// First local date searched.
    pub from: NaiveDate,
    /// Last local date searched (inclusive).
    pub to: NaiveDate,
    /// Skip candidates starting before this instant.
    pub not_before: Option<DateTime<Utc>>,
}

impl SlotQuery {
    pub fn new(participants: Vec<String>, duration_minutes: u32, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            participants,
            duration_minutes,
            from,
            to,
            not_before: None,
        }
    }

    pub fn not_before(mut self, instant: DateTime<Utc>) -> Self {
        self.not_before = Some(instant);
        self
    }
}

/// Heuristic preference for a slot.
///
/// Mornings are favoured, early afternoons less so, lunch is penalised,
/// weekdays beat weekends, and larger groups weigh slightly more.
pub fn score_slot(local_hour: u32, weekday: Weekday, participant_count: usize) -> f64 {
    let mut score = 0.0;
    match local_hour {
        9..=11 => score += 3.0,
        14..=16 => score += 2.0,
        12..=13 => score -= 1.0,
        _ => {}
    }
    if !matches!(weekday, Weekday::Sat | Weekday::Sun) {
        score += 2.0;
    }
    score + 0.5 * participant_count as f64
}

/// Sort by descending score. Stable, so equal scores stay chronological.
pub fn rank(candidates: &mut [TimeSlotCandidate]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Every feasible candidate of `query`, chronologically, against `busy`.
pub fn enumerate_feasible(
    query: &SlotQuery,
    window: &BusinessWindow,
    tz: &TimeContext,
    busy: &BusySnapshot,
) -> Vec<TimeSlotCandidate> {
    let mut out = Vec::new();
    if query.to < query.from {
        return out;
    }
    let times = window.start_times();
    let length = Duration::minutes(i64::from(query.duration_minutes));
    for date in query.from.iter_days().take_while(|d| *d <= query.to) {
        for time in &times {
            let start = tz.at(date, *time);
            if query.not_before.is_some_and(|nb| start < nb) {
                continue;
            }
            let end = start + length;
            if !busy.is_free(start, end) {
                continue;
            }
            let local = tz.to_local(start);
            out.push(TimeSlotCandidate {
                start,
                end,
                participant_count: query.participants.len(),
                score: score_slot(local.hour(), local.weekday(), query.participants.len()),
            });
        }
    }
    out
}

/// Slot search over the meeting store.
#[derive(Clone)]
pub struct SlotSearch {
    detector: ConflictDetector,
    window: BusinessWindow,
    limit: usize,
}

impl SlotSearch {
    pub fn new(detector: ConflictDetector, window: BusinessWindow, limit: usize) -> Self {
        Self {
            detector,
            window,
            limit: limit.max(1),
        }
    }

    pub fn from_config(detector: ConflictDetector, config: &ScheduleConfig) -> Self {
        Self::new(detector, BusinessWindow::from(config), config.suggestion_limit)
    }

    pub fn detector(&self) -> &ConflictDetector {
        &self.detector
    }

    /// Feasible candidates in chronological order, unranked.
    pub async fn feasible(
        &self,
        query: &SlotQuery,
        tz: &TimeContext,
    ) -> Result<Vec<TimeSlotCandidate>, StoreError> {
        let busy = self.detector.snapshot(&query.participants).await?;
        Ok(enumerate_feasible(query, &self.window, tz, &busy))
    }

    /// The best-scoring candidates, at most the configured limit.
    pub async fn suggest(
        &self,
        query: &SlotQuery,
        tz: &TimeContext,
    ) -> Result<Vec<TimeSlotCandidate>, StoreError> {
        let mut candidates = self.feasible(query, tz).await?;
        rank(&mut candidates);
        candidates.truncate(self.limit);
        tracing::debug!(
            participants = query.participants.len(),
            from = %query.from,
            to = %query.to,
            found = candidates.len(),
            "Slot suggestions computed"
        );
        Ok(candidates)
    }

    /// The single best candidate, if any.
    pub async fn optimal(
        &self,
        query: &SlotQuery,
        tz: &TimeContext,
    ) -> Result<Option<TimeSlotCandidate>, StoreError> {
        Ok(self.suggest(query, tz).await?.into_iter().next())
    }

    /// The chronologically first feasible candidate, if any.
    pub async fn earliest(
        &self,
        query: &SlotQuery,
        tz: &TimeContext,
    ) -> Result<Option<TimeSlotCandidate>, StoreError> {
        Ok(self.feasible(query, tz).await?.into_iter().next())
    }
}
