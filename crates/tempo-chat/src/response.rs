//! Reply text: fixed templates, meeting formatting, and optional
//! rephrasing through the completion service.

use tempo_core::time::TimeContext;

use crate::completion::{complete_once, CompletionClient, CompletionRequest};
use crate::extract::{MeetingIntent, MissingField};
use crate::types::MeetingRef;

// =============================================================================
// Templates
// =============================================================================

pub const GENERIC_ERROR: &str =
    "I'm having trouble right now. Could you try again in a moment?";

pub const GREETING: &str =
    "Hello! I'm here to help you manage your meetings and schedule. What would you like to do today?";

pub const CONVERSE_FALLBACK: &str = "I'm here to help you with your meetings and schedule! You can ask me to show your meetings, schedule new ones, update existing ones, or cancel them. What would you like to do?";

pub const HELP_TEXT: &str = "Here's what I can do:\n\
    - Show your meetings (\"show my meetings\")\n\
    - Schedule a meeting (\"schedule a budget meeting tomorrow at 2pm for 30 minutes with dana@example.com\")\n\
    - Change a meeting (\"move my standup to 3pm\", \"make it 45 minutes\")\n\
    - Cancel a meeting (\"cancel the budget meeting\")\n\
    - Cancel all of your meetings (\"cancel all my meetings\")\n\
    What would you like to do?";

pub const NO_MEETINGS: &str = "You don't have any meetings scheduled right now. Would you like me to help you schedule one?";

pub const VIEW_FOLLOW_UP: &str = "Is there anything you'd like to do with these meetings?";

pub const SELECTION_OUT_OF_RANGE: &str = "That number doesn't match any meeting. Please try again.";

pub const SELECTION_UNCLEAR: &str =
    "I couldn't tell which meeting you mean. Please reply with its number from the list, or say \"never mind\".";

pub const SELECTION_CANCELLED: &str = "No problem. Let me know if there's anything else I can help with.";

pub const NOTHING_TO_UPDATE: &str =
    "You don't have any meetings to update. Would you like to schedule a new meeting instead?";

pub const UPDATE_UNCLEAR: &str = "I didn't understand what you want to change. You can tell me a new time, duration or title (e.g., 'change the time to 3pm' or 'make it 30 minutes').";

pub const NOTHING_TO_DELETE: &str = "You don't have any meetings to cancel.";

pub const CREATE_CANCELLED: &str =
    "No problem! I won't schedule that meeting. Let me know if you'd like to set up something else.";

pub const CREATE_ADD_INFO: &str =
    "Sure! What else would you like to add or change? You can give me a new title, time, duration or participants.";

pub const DELETE_KEPT: &str =
    "No problem! The meeting is still scheduled. Is there anything else I can help you with?";

pub const DELETE_ALL_KEPT: &str =
    "No problem! Your meetings are still scheduled. Is there anything else I can help you with?";

pub const YES_NO_REPROMPT: &str = "Please answer yes or no.";

pub const MEETING_GONE: &str =
    "I couldn't find that meeting anymore. It may have already been changed or cancelled.";

// =============================================================================
// Formatting
// =============================================================================

/// `'Title' on Tuesday, June 11 at 02:00 PM (30 minutes)`
pub fn meeting_line(meeting: &MeetingRef, tz: &TimeContext) -> String {
    format!(
        "'{}' on {} ({} minutes)",
        meeting.title,
        tz.describe(meeting.start_time),
        meeting.duration_minutes
    )
}

/// One meeting per line, numbered from 1.
pub fn numbered_list(meetings: &[MeetingRef], tz: &TimeContext) -> String {
    meetings
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{}. {}", i + 1, meeting_line(m, tz)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// "a", "a and b", "a, b and c"
pub fn join_labels(fields: &[MissingField]) -> String {
    let labels: Vec<&str> = fields.iter().map(|f| f.label()).collect();
    match labels.as_slice() {
        [] => String::new(),
        [one] => (*one).to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

/// Canned question for the fields still missing.
pub fn clarification_fallback(missing: &[MissingField]) -> String {
    match missing {
        [MissingField::Title] => "Great! What would you like to call this meeting?".to_string(),
        [MissingField::DateTime] => "When would you like to have this meeting?".to_string(),
        [MissingField::Participants] => "Who would you like to invite to this meeting?".to_string(),
        [MissingField::Duration] => "How long should this meeting be?".to_string(),
        _ => format!(
            "Great! I just need a bit more: {}. What would you like to include?",
            join_labels(missing)
        ),
    }
}

/// First reply to a create request that lacks details.
pub fn initial_clarification_fallback(missing: &[MissingField]) -> String {
    format!(
        "I'd be happy to help you schedule a meeting! I just need a few more details: {}.",
        join_labels(missing)
    )
}

/// Summary of a complete proposal, ending in a yes/no question.
pub fn proposal_summary(proposal: &MeetingIntent, tz: &TimeContext) -> String {
    let mut out = String::from("Here's the meeting I'm about to schedule:\n");
    if let Some(title) = &proposal.title {
        out.push_str(&format!("- Title: {}\n", title));
    }
    if let Some(start) = proposal.start_time {
        out.push_str(&format!("- When: {}\n", tz.describe(start)));
    }
    if let Some(duration) = proposal.duration_minutes {
        out.push_str(&format!("- Duration: {} minutes\n", duration));
    }
    if !proposal.participants.is_empty() {
        out.push_str(&format!("- Participants: {}\n", proposal.participants.join(", ")));
    }
    if let Some(description) = &proposal.description {
        out.push_str(&format!("- About: {}\n", description));
    }
    if let Some(location) = &proposal.location {
        out.push_str(&format!("- Location: {}\n", location));
    }
    out.push_str("Should I go ahead and schedule it? (yes/no)");
    out
}

// =============================================================================
// Rephrasing
// =============================================================================

/// Length window (in characters) a rephrased reply must fall within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RephraseBounds {
    pub min_chars: usize,
    pub max_chars: usize,
}

impl Default for RephraseBounds {
    fn default() -> Self {
        Self {
            min_chars: 10,
            max_chars: 500,
        }
    }
}

impl RephraseBounds {
    pub fn accepts(&self, text: &str) -> bool {
        let n = text.chars().count();
        n >= self.min_chars && n <= self.max_chars
    }
}

fn rephrase_prompt(text: &str) -> String {
    format!(
        "Rephrase the following reply from a friendly scheduling assistant. Keep every fact \
         (titles, dates, times, numbers) exactly as given. Reply with the rephrased text only.\n\n{}",
        text
    )
}

/// One rephrasing attempt. Falls back to `text` on any failure or when the
/// result is outside `bounds`.
pub async fn rephrase(client: &dyn CompletionClient, text: &str, bounds: RephraseBounds) -> String {
    let request = CompletionRequest::prompt(rephrase_prompt(text));
    match complete_once(client, "rephrase", request).await {
        Ok(candidate) => {
            let candidate = candidate.trim();
            if bounds.accepts(candidate) {
                candidate.to_string()
            } else {
                tracing::debug!(
                    chars = candidate.chars().count(),
                    "Rephrased reply outside length bounds, keeping original"
                );
                text.to_string()
            }
        }
        Err(_) => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use crate::completion::{CompletionError, UnavailableCompletionClient};

    struct Fixed(String);

    impl Fixed {
        fn new(reply: impl Into<String>) -> Self {
            Self(reply.into())
        }
    }

    #[async_trait]
    impl CompletionClient for Fixed {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionError> {
            Ok(self.0.clone())
        }
    }

    fn tz() -> TimeContext {
        TimeContext::utc(Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap())
    }

    fn mref(title: &str, hour: u32) -> MeetingRef {
        MeetingRef {
            id: Uuid::new_v4(),
            title: title.into(),
            start_time: Utc.with_ymd_and_hms(2024, 6, 11, hour, 0, 0).unwrap(),
            duration_minutes: 30,
        }
    }

    // ---- Formatting ----

    #[test]
    fn test_meeting_line() {
        assert_eq!(
            meeting_line(&mref("Budget", 14), &tz()),
            "'Budget' on Tuesday, June 11 at 02:00 PM (30 minutes)"
        );
    }

    #[test]
    fn test_numbered_list() {
        let list = numbered_list(&[mref("A", 9), mref("B", 10)], &tz());
        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1. 'A'"));
        assert!(lines[1].starts_with("2. 'B'"));
    }

    #[test]
    fn test_join_labels() {
        assert_eq!(join_labels(&[MissingField::Title]), "meeting title");
        assert_eq!(
            join_labels(&[MissingField::Title, MissingField::Duration]),
            "meeting title and duration"
        );
        assert_eq!(
            join_labels(&[
                MissingField::Title,
                MissingField::DateTime,
                MissingField::Duration
            ]),
            "meeting title, date and time and duration"
        );
    }

    #[test]
    fn test_clarification_fallbacks() {
        assert_eq!(
            clarification_fallback(&[MissingField::Title]),
            "Great! What would you like to call this meeting?"
        );
        assert!(clarification_fallback(&[MissingField::Title, MissingField::Participants])
            .contains("meeting title and participants"));
    }

    #[test]
    fn test_proposal_summary_asks_yes_no() {
        let proposal = MeetingIntent {
            title: Some("Sync".into()),
            start_time: Some(Utc.with_ymd_and_hms(2024, 6, 11, 14, 0, 0).unwrap()),
            duration_minutes: Some(30),
            participants: vec!["a@b.com".into()],
            ..Default::default()
        };
        let summary = proposal_summary(&proposal, &tz());
        assert!(summary.contains("- Title: Sync"));
        assert!(summary.contains("Tuesday, June 11 at 02:00 PM"));
        assert!(summary.ends_with("(yes/no)"));
    }

    // ---- Rephrasing ----

    #[tokio::test]
    async fn test_rephrase_accepts_within_bounds() {
        let out = rephrase(&Fixed::new("  All set, see you then!  "), "Done.", RephraseBounds::default()).await;
        assert_eq!(out, "All set, see you then!");
    }

    #[tokio::test]
    async fn test_rephrase_rejects_out_of_bounds() {
        let bounds = RephraseBounds::default();
        assert_eq!(rephrase(&Fixed::new("ok"), "Original text", bounds).await, "Original text");
        let long = Fixed::new("x".repeat(501));
        assert_eq!(rephrase(&long, "Original text", bounds).await, "Original text");
    }

    #[tokio::test]
    async fn test_rephrase_falls_back_on_failure() {
        let out = rephrase(&UnavailableCompletionClient, "Original text", RephraseBounds::default()).await;
        assert_eq!(out, "Original text");
    }
}
