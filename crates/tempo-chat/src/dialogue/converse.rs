use std::sync::LazyLock;

use regex::Regex;

use crate::completion::{complete_once, CompletionRequest};
use crate::error::ChatError;
use crate::response;

use super::{DialogueEngine, Reply, Step, TurnCtx};

static HELP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(help|what can you do|how does (this|it) work|commands)\b")
        .expect("Invalid help regex")
});

static GREETING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(hi|hello|hey|good (morning|afternoon|evening))\b")
        .expect("Invalid greeting regex")
});

const CONVERSE_SYSTEM: &str = "You are a friendly assistant that helps people manage their meetings. \
    Answer briefly. If the user asks about their schedule, use the meetings listed in the context. \
    You can show, schedule, change and cancel meetings when asked.";

impl DialogueEngine {
    pub(crate) async fn handle_converse(&self, cx: &TurnCtx<'_>) -> Result<Step, ChatError> {
        if HELP_RE.is_match(cx.text) {
            return Ok(Step::finish(Reply::text(response::HELP_TEXT)));
        }
        if GREETING_RE.is_match(cx.text) {
            return Ok(Step::finish(Reply::text(response::GREETING)));
        }

        let meetings = self.active_meetings(cx.user_id).await?;
        let request = CompletionRequest::with_system(CONVERSE_SYSTEM, self.prompt_context(cx, &meetings));
        let text = match complete_once(self.completion.as_ref(), "converse", request).await {
            Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            _ => response::CONVERSE_FALLBACK.to_string(),
        };
        Ok(Step::finish(Reply::text(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_and_greeting_patterns() {
        assert!(HELP_RE.is_match("Help!"));
        assert!(HELP_RE.is_match("what can you do?"));
        assert!(!HELP_RE.is_match("helpful notes"));
        assert!(GREETING_RE.is_match("Good morning there"));
        assert!(GREETING_RE.is_match("hey"));
        assert!(!GREETING_RE.is_match("they said hi"));
    }
}
