//! Keyword intent classification.
//!
//! Patterns are case-insensitive and word-bounded, so "reschedule" never
//! matches the create pattern for "schedule".

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    View,
    Create,
    Update,
    Delete,
    DeleteAll,
    Converse,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::View => "view",
            Intent::Create => "create",
            Intent::Update => "update",
            Intent::Delete => "delete",
            Intent::DeleteAll => "delete_all",
            Intent::Converse => "converse",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Compiled regex sets
// =============================================================================

struct IntentPatterns {
    view: Vec<Regex>,
    create: Vec<Regex>,
    update: Vec<Regex>,
    delete_all: Vec<Regex>,
    delete: Vec<Regex>,
}

static INTENT_PATTERNS: LazyLock<IntentPatterns> = LazyLock::new(|| {
    let mk = |pats: &[&str]| -> Vec<Regex> {
        pats.iter()
            .map(|p| Regex::new(p).expect("Invalid intent regex"))
            .collect()
    };

    IntentPatterns {
        view: mk(&[
            r"(?i)\b(?:show|view|see|list|display|what|which|check)\b.*\b(?:meetings?|schedule|calendar|agenda)\b",
            r"(?i)\bdo\s+i\s+have\b",
            r"(?i)\bam\s+i\s+(?:free|busy)\b",
            r"(?i)^\s*(?:my\s+)?(?:meetings|calendar|agenda|schedule)\s*\??\s*$",
        ]),
        create: mk(&[
            r"(?i)^\s*schedule\b",
            r"(?i)\bschedule\s+(?:a|an|another|the|my|our|new|me|us|meeting|call|sync|time)\b",
            r"(?i)\b(?:create|book|arrange|organi[sz]e|plan)\b",
            r"(?i)\bset\s+up\b",
            r"(?i)\bnew\s+meeting\b",
        ]),
        update: mk(&[
            r"(?i)\b(?:change|update|modify|move|reschedule|edit|shift|postpone|rename)\b",
            r"(?i)\bpush\b",
        ]),
        delete_all: mk(&[
            r"(?i)\b(?:cancel|delete|remove|clear|drop)\b.*\b(?:all|everything|every)\b",
            r"(?i)\bclear\s+my\s+(?:calendar|schedule)\b",
        ]),
        delete: mk(&[r"(?i)\b(?:cancel|delete|remove|clear|drop|call\s+off)\b"]),
    }
});

/// Classify an utterance. Priority: view, create, update, delete_all,
/// delete; anything else is conversation.
pub fn classify(text: &str) -> Intent {
    let pats = &*INTENT_PATTERNS;
    let any = |set: &[Regex]| set.iter().any(|re| re.is_match(text));

    if any(&pats.view) {
        Intent::View
    } else if any(&pats.create) {
        Intent::Create
    } else if any(&pats.update) {
        Intent::Update
    } else if any(&pats.delete_all) {
        Intent::DeleteAll
    } else if any(&pats.delete) {
        Intent::Delete
    } else {
        Intent::Converse
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- View ----

    #[test]
    fn test_view_show_my_meetings() {
        assert_eq!(classify("show my meetings"), Intent::View);
    }

    #[test]
    fn test_view_whats_on_calendar() {
        assert_eq!(classify("What's on my calendar?"), Intent::View);
    }

    #[test]
    fn test_view_bare_noun() {
        assert_eq!(classify("my calendar?"), Intent::View);
        assert_eq!(classify("cancel all my meetings"), Intent::DeleteAll);
    }

    #[test]
    fn test_view_do_i_have() {
        assert_eq!(classify("do I have anything tomorrow"), Intent::View);
    }

    // ---- Create ----

    #[test]
    fn test_create_schedule_a_meeting() {
        assert_eq!(
            classify("schedule a meeting tomorrow at 2pm for 30 minutes with a@b.com"),
            Intent::Create
        );
    }

    #[test]
    fn test_create_book() {
        assert_eq!(classify("Book a call with Dana on Friday"), Intent::Create);
    }

    #[test]
    fn test_create_set_up() {
        assert_eq!(classify("can you set up a sync with the team"), Intent::Create);
    }

    // ---- Update ----

    #[test]
    fn test_reschedule_is_update_not_create() {
        assert_eq!(classify("reschedule my standup to 3pm"), Intent::Update);
    }

    #[test]
    fn test_update_move() {
        assert_eq!(classify("Move the design review to tomorrow"), Intent::Update);
    }

    #[test]
    fn test_plan_and_push() {
        assert_eq!(classify("plan a retro for Friday"), Intent::Create);
        assert_eq!(classify("push the retro to 4pm"), Intent::Update);
    }

    #[test]
    fn test_change_the_schedule_noun_is_update() {
        assert_eq!(classify("change the schedule for standup"), Intent::Update);
    }

    // ---- Delete ----

    #[test]
    fn test_delete_all_before_delete() {
        assert_eq!(classify("cancel all my meetings"), Intent::DeleteAll);
        assert_eq!(classify("delete everything"), Intent::DeleteAll);
    }

    #[test]
    fn test_delete_single() {
        assert_eq!(classify("cancel the budget meeting"), Intent::Delete);
        assert_eq!(classify("please remove my 3pm"), Intent::Delete);
    }

    // ---- Converse ----

    #[test]
    fn test_converse_fallback() {
        assert_eq!(classify("hello there"), Intent::Converse);
        assert_eq!(classify("what can you do?"), Intent::Converse);
        assert_eq!(classify(""), Intent::Converse);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("SHOW MY SCHEDULE"), Intent::View);
        assert_eq!(classify("CANCEL IT"), Intent::Delete);
    }

    #[test]
    fn test_intent_display() {
        assert_eq!(Intent::DeleteAll.to_string(), "delete_all");
    }
}
