//! The dialogue state machine.
//!
//! Each turn either resumes the user's pending action through its resolver
//! or classifies the message and runs the matching intent handler. A
//! handler answers with a [`Step`]: the reply plus what the conversation
//! waits on next. Handler errors never reach the caller as faults; they
//! clear the pending action and produce a generic retry message.

mod confirm;
mod converse;
mod create;
mod delete;
mod update;
mod view;

pub use confirm::{is_dismissal, parse_confirmation, Confirmation, Vocabulary};

use std::sync::Arc;

use chrono::{DateTime, Utc};

use tempo_core::config::{ChatConfig, ScheduleConfig, TempoConfig};
use tempo_core::time::{Clock, SystemClock, TimeContext};
use tempo_core::types::Meeting;
use tempo_schedule::{AutoRescheduler, ConflictDetector, MeetingStore, RescheduleReport, SlotSearch};

use crate::completion::CompletionClient;
use crate::context::build_context;
use crate::error::ChatError;
use crate::extract::{model, rules, ExtractionPurpose, ModelExtraction};
use crate::intent::{classify, Intent};
use crate::response::{self, RephraseBounds};
use crate::session::{ConversationState, SessionStore, Turn, TurnRole};
use crate::types::{ChatReply, MeetingRef, PendingAction};

// =============================================================================
// Step
// =============================================================================

/// Reply text plus whatever structured results a handler produced.
#[derive(Debug, Clone, Default)]
pub(crate) struct Reply {
    text: String,
    success: bool,
    /// Eligible for rephrasing by the completion service.
    rephrase: bool,
    meetings: Vec<Meeting>,
    report: RescheduleReport,
}

impl Reply {
    /// A fixed reply (lists, prompts, help text).
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
            ..Default::default()
        }
    }

    /// A final answer that may be rephrased.
    fn rephrasable(text: impl Into<String>) -> Self {
        Self {
            rephrase: true,
            ..Self::text(text)
        }
    }

    fn failure(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: false,
            ..Default::default()
        }
    }

    fn with_meetings(mut self, meetings: Vec<Meeting>) -> Self {
        self.meetings = meetings;
        self
    }

    fn with_report(mut self, report: RescheduleReport) -> Self {
        self.report = report;
        self
    }
}

/// What the conversation waits on after a turn.
#[derive(Debug, Clone)]
pub(crate) enum Next {
    /// Nothing; clears any pending action.
    Finish,
    Await(PendingAction),
    /// Keep the current pending action unchanged.
    Stay,
}

#[derive(Debug, Clone)]
pub(crate) struct Step {
    reply: Reply,
    next: Next,
}

impl Step {
    fn finish(reply: Reply) -> Self {
        Self {
            reply,
            next: Next::Finish,
        }
    }

    fn wait_for(reply: Reply, action: PendingAction) -> Self {
        Self {
            reply,
            next: Next::Await(action),
        }
    }

    fn stay(reply: Reply) -> Self {
        Self {
            reply,
            next: Next::Stay,
        }
    }
}

/// Inputs shared by every handler during one turn.
pub(crate) struct TurnCtx<'a> {
    user_id: &'a str,
    text: &'a str,
    tz: TimeContext,
    /// Earlier turns; the current message is not yet included.
    history: &'a [Turn],
}

// =============================================================================
// DialogueEngine
// =============================================================================

/// Per-user conversational scheduling over a meeting store.
pub struct DialogueEngine {
    store: Arc<dyn MeetingStore>,
    completion: Arc<dyn CompletionClient>,
    sessions: SessionStore,
    search: SlotSearch,
    rescheduler: AutoRescheduler,
    clock: Arc<dyn Clock>,
    chat: ChatConfig,
    schedule: ScheduleConfig,
}

impl DialogueEngine {
    pub fn new(
        store: Arc<dyn MeetingStore>,
        completion: Arc<dyn CompletionClient>,
        config: &TempoConfig,
    ) -> Self {
        let detector = ConflictDetector::new(Arc::clone(&store));
        let search = SlotSearch::from_config(detector, &config.schedule);
        let rescheduler = AutoRescheduler::from_config(search.clone(), &config.schedule);
        Self {
            store,
            completion,
            sessions: SessionStore::new(config.chat.session_ttl_minutes),
            search,
            rescheduler,
            clock: Arc::new(SystemClock),
            chat: config.chat.clone(),
            schedule: config.schedule.clone(),
        }
    }

    /// Replace the wall clock (tests, replays).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn MeetingStore> {
        &self.store
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Slot search configured from the `[schedule]` section.
    pub fn slot_search(&self) -> &SlotSearch {
        &self.search
    }

    pub fn time_context(&self) -> TimeContext {
        TimeContext::new(self.clock.now(), self.schedule.utc_offset_minutes)
    }

    /// The user's pending action, if any.
    pub async fn pending(&self, user_id: &str) -> Result<Option<PendingAction>, ChatError> {
        self.sessions.pending(user_id).await
    }

    /// Handle one message from `user_id`.
    ///
    /// Only validation failures are returned as errors; everything else,
    /// including store and completion outages, produces a reply.
    pub async fn process_message(&self, user_id: &str, text: &str) -> Result<ChatReply, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.chars().count() > self.chat.max_message_length {
            return Err(ChatError::MessageTooLong(self.chat.max_message_length));
        }

        let tz = self.time_context();
        let session = self.sessions.session(user_id, tz.now())?;
        let mut state = session.lock().await;

        let pending = state.pending().cloned();
        let intent = match pending {
            Some(_) => None,
            None => Some(classify(text)),
        };
        tracing::info!(
            user_id,
            intent = ?intent,
            pending = ?pending.as_ref().map(|p| p.kind()),
            "Handling chat message"
        );

        let outcome = {
            let cx = TurnCtx {
                user_id,
                text,
                tz,
                history: state.history(),
            };
            match (pending, intent) {
                (Some(action), _) => self.resolve(&cx, action).await,
                (None, Some(intent)) => self.dispatch(&cx, intent).await,
                (None, None) => Err(ChatError::InvalidState("no intent for new turn".into())),
            }
        };

        let step = match outcome {
            Ok(step) => step,
            Err(e) => {
                tracing::error!(user_id, error = %e, "Dialogue handler failed");
                Step::finish(Reply::failure(response::GENERIC_ERROR))
            }
        };

        let reply = self.finish_turn(&mut state, text, step, tz.now()).await;
        Ok(ChatReply {
            success: reply.success,
            message: reply.text,
            intent,
            pending: state.pending().map(|p| p.kind()),
            meetings: reply.meetings,
            rescheduled: reply.report.rescheduled,
            unresolved_conflicts: reply.report.unresolved,
        })
    }

    async fn finish_turn(
        &self,
        state: &mut ConversationState,
        text: &str,
        step: Step,
        now: DateTime<Utc>,
    ) -> Reply {
        match step.next {
            Next::Finish => {
                state.clear_pending();
            }
            Next::Await(action) => state.set_pending(action),
            Next::Stay => {}
        }
        tracing::debug!(pending = ?state.pending().map(|p| p.kind()), "Dialogue state after turn");

        let mut reply = step.reply;
        if reply.rephrase && self.chat.rephrase_replies {
            reply.text = response::rephrase(self.completion.as_ref(), &reply.text, self.bounds()).await;
        }

        let limit = self.chat.history_limit;
        state.push_turn(TurnRole::User, text, now, limit);
        state.push_turn(TurnRole::Assistant, reply.text.clone(), now, limit);
        reply
    }

    async fn dispatch(&self, cx: &TurnCtx<'_>, intent: Intent) -> Result<Step, ChatError> {
        match intent {
            Intent::View => self.handle_view(cx).await,
            Intent::Create => self.handle_create(cx).await,
            Intent::Update => self.handle_update(cx).await,
            Intent::Delete => self.handle_delete(cx).await,
            Intent::DeleteAll => self.handle_delete_all(cx).await,
            Intent::Converse => self.handle_converse(cx).await,
        }
    }

    async fn resolve(&self, cx: &TurnCtx<'_>, action: PendingAction) -> Result<Step, ChatError> {
        match action {
            PendingAction::AwaitingCreateDetails { partial, missing } => {
                self.resolve_create_details(cx, partial, missing).await
            }
            PendingAction::AwaitingCreateConfirmation { proposal } => {
                self.resolve_create_confirmation(cx, proposal).await
            }
            PendingAction::AwaitingMeetingSelectionForUpdate { candidates } => {
                self.resolve_update_selection(cx, candidates).await
            }
            PendingAction::AwaitingUpdateDetails { target } => {
                self.resolve_update_details(cx, target).await
            }
            PendingAction::AwaitingMeetingSelectionForDelete { candidates } => {
                self.resolve_delete_selection(cx, candidates).await
            }
            PendingAction::AwaitingDeleteConfirmation { target } => {
                self.resolve_delete_confirmation(cx, target).await
            }
            PendingAction::AwaitingDeleteAllConfirmation { count } => {
                self.resolve_delete_all(cx, count).await
            }
        }
    }

    // ---- Shared helpers ----

    fn bounds(&self) -> RephraseBounds {
        RephraseBounds {
            min_chars: self.chat.rephrase_min_chars,
            max_chars: self.chat.rephrase_max_chars,
        }
    }

    /// Proposed and confirmed meetings the user attends, earliest first.
    async fn active_meetings(&self, user_id: &str) -> Result<Vec<Meeting>, ChatError> {
        let mut meetings: Vec<Meeting> = self
            .store
            .list_for_user(user_id, None)
            .await?
            .into_iter()
            .filter(|m| m.status.is_active())
            .collect();
        meetings.sort_by_key(|m| m.start_time);
        Ok(meetings)
    }

    /// Active meetings the user organizes; only these can be changed or
    /// cancelled by them.
    async fn owned_meetings(&self, user_id: &str) -> Result<Vec<Meeting>, ChatError> {
        let mut meetings = self.active_meetings(user_id).await?;
        meetings.retain(|m| m.organizer_id == user_id);
        Ok(meetings)
    }

    fn prompt_context(&self, cx: &TurnCtx<'_>, meetings: &[Meeting]) -> String {
        build_context(&cx.tz, meetings, cx.history, self.chat.context_turns, cx.text)
    }

    async fn model_extract(
        &self,
        cx: &TurnCtx<'_>,
        purpose: ExtractionPurpose,
        meetings: &[Meeting],
    ) -> Option<ModelExtraction> {
        let context = self.prompt_context(cx, meetings);
        model::extract_with_model(self.completion.as_ref(), purpose, &context, &cx.tz).await
    }
}

/// Resolve a model's description of a meeting against the candidates:
/// exact start time first, then title.
fn locate(
    title: Option<&str>,
    start: Option<DateTime<Utc>>,
    candidates: &[MeetingRef],
) -> Option<MeetingRef> {
    if let Some(start) = start {
        if let Some(found) = candidates.iter().find(|c| c.start_time == start) {
            return Some(found.clone());
        }
    }
    title
        .and_then(|t| rules::find_by_title(t, candidates))
        .map(|i| candidates[i].clone())
}

fn refs(meetings: &[Meeting]) -> Vec<MeetingRef> {
    meetings.iter().map(MeetingRef::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn mref(title: &str, hour: u32) -> MeetingRef {
        MeetingRef {
            id: Uuid::new_v4(),
            title: title.into(),
            start_time: Utc.with_ymd_and_hms(2024, 6, 12, hour, 0, 0).unwrap(),
            duration_minutes: 30,
        }
    }

    #[test]
    fn test_locate_prefers_start_time() {
        let list = vec![mref("Budget", 9), mref("Budget", 14)];
        let start = Utc.with_ymd_and_hms(2024, 6, 12, 14, 0, 0).unwrap();
        assert_eq!(
            locate(Some("Budget"), Some(start), &list).map(|m| m.id),
            Some(list[1].id)
        );
        assert_eq!(
            locate(Some("budget"), None, &list).map(|m| m.id),
            Some(list[0].id)
        );
        assert!(locate(Some("Roadmap"), None, &list).is_none());
        assert!(locate(None, None, &list).is_none());
    }

    #[test]
    fn test_reply_constructors() {
        assert!(Reply::text("x").success);
        assert!(!Reply::text("x").rephrase);
        assert!(Reply::rephrasable("x").rephrase);
        assert!(!Reply::failure("x").success);
    }
}
