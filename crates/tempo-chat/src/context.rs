//! Prompt context assembly.
//!
//! Every model call sees the same preamble: the current local date and
//! time, the user's meetings as JSON, a few recent turns, and the message
//! being handled.

use serde_json::json;

use tempo_core::time::TimeContext;
use tempo_core::types::Meeting;

use crate::session::Turn;

/// Render the context block for a model prompt.
///
/// `history` should not include `message` itself; at most `turns` of it
/// are shown.
pub fn build_context(
    tz: &TimeContext,
    meetings: &[Meeting],
    history: &[Turn],
    turns: usize,
    message: &str,
) -> String {
    let local = tz.local_now();
    let mut out = format!(
        "Current date and time: {} (UTC{})\n",
        local.format("%A, %Y-%m-%d %H:%M"),
        local.format("%:z"),
    );

    out.push_str("User's meetings: ");
    out.push_str(&meetings_json(tz, meetings));
    out.push('\n');

    let start = history.len().saturating_sub(turns);
    let recent = &history[start..];
    if !recent.is_empty() {
        out.push_str("Recent conversation:\n");
        for turn in recent {
            out.push_str(turn.role.label());
            out.push_str(": ");
            out.push_str(&turn.text);
            out.push('\n');
        }
    }

    out.push_str("Current message: ");
    out.push_str(message);
    out
}

fn meetings_json(tz: &TimeContext, meetings: &[Meeting]) -> String {
    let items: Vec<serde_json::Value> = meetings
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "title": m.title,
                "start_time": tz.to_local(m.start_time).format("%Y-%m-%dT%H:%M:%S").to_string(),
                "duration_minutes": m.duration_minutes,
                "participants": m.participants,
                "status": m.status,
            })
        })
        .collect();
    serde_json::Value::Array(items).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempo_core::types::NewMeeting;

    use crate::session::TurnRole;

    fn turn(role: TurnRole, text: &str) -> Turn {
        Turn {
            role,
            text: text.to_string(),
            at: Utc.with_ymd_and_hms(2024, 6, 11, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_context_sections() {
        let now = Utc.with_ymd_and_hms(2024, 6, 11, 8, 0, 0).unwrap();
        let tz = TimeContext::new(now, 60);
        let start = Utc.with_ymd_and_hms(2024, 6, 12, 13, 0, 0).unwrap();
        let meetings = vec![NewMeeting::new("alice", "Budget", start, 30).into_meeting(now)];
        let history = vec![
            turn(TurnRole::User, "one"),
            turn(TurnRole::Assistant, "two"),
            turn(TurnRole::User, "three"),
            turn(TurnRole::Assistant, "four"),
        ];

        let ctx = build_context(&tz, &meetings, &history, 3, "cancel it");
        assert!(ctx.starts_with("Current date and time: Tuesday, 2024-06-11 09:00 (UTC+01:00)"));
        assert!(ctx.contains("\"title\":\"Budget\""));
        assert!(ctx.contains("\"start_time\":\"2024-06-12T14:00:00\""));
        assert!(!ctx.contains("User: one"));
        assert!(ctx.contains("Assistant: two\nUser: three\nAssistant: four\n"));
        assert!(ctx.ends_with("Current message: cancel it"));
    }

    #[test]
    fn test_context_without_history() {
        let tz = TimeContext::utc(Utc.with_ymd_and_hms(2024, 6, 11, 8, 0, 0).unwrap());
        let ctx = build_context(&tz, &[], &[], 3, "hi");
        assert!(ctx.contains("User's meetings: []"));
        assert!(!ctx.contains("Recent conversation"));
    }
}
