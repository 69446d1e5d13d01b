use crate::error::ChatError;
use crate::extract::{rules, ExtractionPurpose, ModelExtraction, Selection};
use crate::response::{self, meeting_line, numbered_list};
use crate::types::{MeetingRef, PendingAction};

use super::{is_dismissal, locate, parse_confirmation, refs, Confirmation, Vocabulary};
use super::{DialogueEngine, Reply, Step, TurnCtx};

impl DialogueEngine {
    pub(crate) async fn handle_delete(&self, cx: &TurnCtx<'_>) -> Result<Step, ChatError> {
        let meetings = self.owned_meetings(cx.user_id).await?;
        if meetings.is_empty() {
            return Ok(Step::finish(Reply::rephrasable(response::NOTHING_TO_DELETE)));
        }
        let candidates = refs(&meetings);

        if let Selection::Index(i) = rules::identify_meeting(cx.text, &candidates, &cx.tz) {
            return Ok(self.confirm_delete(cx, candidates[i].clone()));
        }

        match self.model_extract(cx, ExtractionPurpose::Delete, &meetings).await {
            Some(ModelExtraction::DeleteMeeting {
                target_title,
                target_start,
            }) => {
                if let Some(target) = locate(target_title.as_deref(), target_start, &candidates) {
                    return Ok(self.confirm_delete(cx, target));
                }
            }
            Some(ModelExtraction::ClarifyDelete { missing }) => {
                return Ok(Step::finish(Reply::text(format!(
                    "I need more information to identify the meeting you want to cancel. Could you specify the {}?",
                    missing
                ))));
            }
            _ => {}
        }

        Ok(Step::wait_for(
            Reply::text(format!(
                "Which meeting would you like to cancel?\n{}",
                numbered_list(&candidates, &cx.tz)
            )),
            PendingAction::AwaitingMeetingSelectionForDelete { candidates },
        ))
    }

    fn confirm_delete(&self, cx: &TurnCtx<'_>, target: MeetingRef) -> Step {
        Step::wait_for(
            Reply::text(format!(
                "Are you sure you want to cancel {}? (yes/no)",
                meeting_line(&target, &cx.tz)
            )),
            PendingAction::AwaitingDeleteConfirmation { target },
        )
    }

    pub(crate) async fn resolve_delete_selection(
        &self,
        cx: &TurnCtx<'_>,
        candidates: Vec<MeetingRef>,
    ) -> Result<Step, ChatError> {
        if is_dismissal(cx.text) {
            return Ok(Step::finish(Reply::rephrasable(response::SELECTION_CANCELLED)));
        }
        Ok(match rules::identify_meeting(cx.text, &candidates, &cx.tz) {
            Selection::Index(i) => self.confirm_delete(cx, candidates[i].clone()),
            Selection::OutOfRange => Step::stay(Reply::text(response::SELECTION_OUT_OF_RANGE)),
            Selection::NoMatch => Step::stay(Reply::text(response::SELECTION_UNCLEAR)),
        })
    }

    pub(crate) async fn resolve_delete_confirmation(
        &self,
        cx: &TurnCtx<'_>,
        target: MeetingRef,
    ) -> Result<Step, ChatError> {
        match parse_confirmation(cx.text, Vocabulary::Destructive) {
            Confirmation::Yes => {
                let Some(deleted) = self.store.delete(target.id, Some(cx.user_id)).await? else {
                    tracing::warn!(meeting_id = %target.id, "Delete target no longer exists");
                    return Ok(Step::finish(Reply::failure(response::MEETING_GONE)));
                };
                tracing::info!(
                    user_id = cx.user_id,
                    meeting_id = %deleted.id,
                    "Meeting deleted"
                );
                let text = format!(
                    "I've deleted the meeting '{}' on {}. Is there anything else I can help you with?",
                    deleted.title,
                    cx.tz.describe_date(deleted.start_time)
                );
                Ok(Step::finish(Reply::rephrasable(text).with_meetings(vec![deleted])))
            }
            Confirmation::No => Ok(Step::finish(Reply::rephrasable(response::DELETE_KEPT))),
            Confirmation::AddInfo | Confirmation::Unclear => Ok(Step::stay(Reply::text(format!(
                "{} Should I cancel '{}'?",
                response::YES_NO_REPROMPT,
                target.title
            )))),
        }
    }

    pub(crate) async fn handle_delete_all(&self, cx: &TurnCtx<'_>) -> Result<Step, ChatError> {
        let meetings = self.owned_meetings(cx.user_id).await?;
        if meetings.is_empty() {
            return Ok(Step::finish(Reply::rephrasable(response::NOTHING_TO_DELETE)));
        }
        let count = meetings.len();
        Ok(Step::wait_for(
            Reply::text(format!(
                "Are you sure you want to cancel all {} of your meetings? This cannot be undone. (yes/no)",
                count
            )),
            PendingAction::AwaitingDeleteAllConfirmation { count },
        ))
    }

    pub(crate) async fn resolve_delete_all(&self, cx: &TurnCtx<'_>, count: usize) -> Result<Step, ChatError> {
        match parse_confirmation(cx.text, Vocabulary::Destructive) {
            Confirmation::Yes => {
                let meetings = self.owned_meetings(cx.user_id).await?;
                let mut deleted = Vec::with_capacity(meetings.len());
                for meeting in meetings {
                    if let Some(gone) = self.store.delete(meeting.id, Some(cx.user_id)).await? {
                        deleted.push(gone);
                    }
                }
                tracing::info!(
                    user_id = cx.user_id,
                    deleted = deleted.len(),
                    expected = count,
                    "Deleted all meetings"
                );
                let text = match deleted.len() {
                    0 => response::NOTHING_TO_DELETE.to_string(),
                    1 => "Done! I've cancelled 1 meeting.".to_string(),
                    n => format!("Done! I've cancelled {} meetings.", n),
                };
                Ok(Step::finish(Reply::rephrasable(text).with_meetings(deleted)))
            }
            Confirmation::No => Ok(Step::finish(Reply::rephrasable(response::DELETE_ALL_KEPT))),
            Confirmation::AddInfo | Confirmation::Unclear => Ok(Step::stay(Reply::text(format!(
                "{} Should I cancel all {} of your meetings?",
                response::YES_NO_REPROMPT,
                count
            )))),
        }
    }
}
