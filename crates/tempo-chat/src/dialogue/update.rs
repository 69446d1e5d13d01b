use tempo_core::types::{Meeting, MeetingPatch};

use crate::error::ChatError;
use crate::extract::{rules, ExtractionPurpose, ModelExtraction, Selection};
use crate::response::{self, numbered_list};
use crate::types::{MeetingRef, PendingAction};

use super::{is_dismissal, locate, refs, DialogueEngine, Reply, Step, TurnCtx};

impl DialogueEngine {
    pub(crate) async fn handle_update(&self, cx: &TurnCtx<'_>) -> Result<Step, ChatError> {
        let meetings = self.owned_meetings(cx.user_id).await?;
        if meetings.is_empty() {
            return Ok(Step::finish(Reply::rephrasable(response::NOTHING_TO_UPDATE)));
        }
        let candidates = refs(&meetings);

        let model = self.model_extract(cx, ExtractionPurpose::Update, &meetings).await;
        let (model_target, model_patch) = match model {
            Some(ModelExtraction::UpdateMeeting {
                target_title,
                target_start,
                patch,
            }) => (
                locate(target_title.as_deref(), target_start, &candidates),
                Some(patch),
            ),
            _ => (None, None),
        };

        let target = match rules::identify_meeting(cx.text, &candidates, &cx.tz) {
            Selection::Index(i) => Some(candidates[i].clone()),
            _ => model_target,
        };
        let Some(target) = target else {
            return Ok(Step::wait_for(
                Reply::text(format!(
                    "Which meeting would you like to update?\n{}",
                    numbered_list(&candidates, &cx.tz)
                )),
                PendingAction::AwaitingMeetingSelectionForUpdate { candidates },
            ));
        };

        let patch = merge_patch(
            rules::extract_update(cx.text, &target, &cx.tz),
            model_patch,
            &target,
        );
        self.update_or_ask(cx, target, patch).await
    }

    async fn update_or_ask(
        &self,
        cx: &TurnCtx<'_>,
        target: MeetingRef,
        patch: MeetingPatch,
    ) -> Result<Step, ChatError> {
        if patch.is_empty() {
            return Ok(Step::wait_for(
                Reply::text(format!(
                    "Great! I found your meeting '{}'. What would you like to change about it? (time, duration, title, etc.)",
                    target.title
                )),
                PendingAction::AwaitingUpdateDetails { target },
            ));
        }
        self.apply_update(cx, &target, patch).await
    }

    async fn apply_update(
        &self,
        cx: &TurnCtx<'_>,
        target: &MeetingRef,
        patch: MeetingPatch,
    ) -> Result<Step, ChatError> {
        let Some(meeting) = self.store.update(target.id, patch).await? else {
            tracing::warn!(meeting_id = %target.id, "Update target no longer exists");
            return Ok(Step::finish(Reply::failure(response::MEETING_GONE)));
        };
        tracing::info!(
            user_id = cx.user_id,
            meeting_id = %meeting.id,
            "Meeting updated"
        );

        let mut text = format!(
            "Done! I've updated '{}'. It's now on {} at {} ({} minutes).",
            meeting.title,
            cx.tz.describe_date(meeting.start_time),
            cx.tz.describe_time(meeting.start_time),
            meeting.duration_minutes
        );
        let overlaps = self.overlaps_after_update(cx.user_id, &meeting).await?;
        if !overlaps.is_empty() {
            let titles: Vec<String> = overlaps.iter().map(|m| format!("'{}'", m.title)).collect();
            text.push_str(&format!(" Note that it now overlaps with {}.", titles.join(", ")));
        }
        Ok(Step::finish(Reply::rephrasable(text).with_meetings(vec![meeting])))
    }

    async fn overlaps_after_update(&self, user_id: &str, meeting: &Meeting) -> Result<Vec<Meeting>, ChatError> {
        Ok(self
            .search
            .detector()
            .conflicts_excluding(user_id, meeting.start_time, meeting.end_time, meeting.id)
            .await?)
    }

    /// Rule changes merged with whatever the model read from the message.
    async fn read_changes(&self, cx: &TurnCtx<'_>, target: &MeetingRef) -> Result<MeetingPatch, ChatError> {
        let from_rules = rules::extract_update(cx.text, target, &cx.tz);
        let meetings = self.owned_meetings(cx.user_id).await?;
        let from_model = match self.model_extract(cx, ExtractionPurpose::Update, &meetings).await {
            Some(ModelExtraction::UpdateMeeting { patch, .. }) => Some(patch),
            _ => None,
        };
        Ok(merge_patch(from_rules, from_model, target))
    }

    pub(crate) async fn resolve_update_selection(
        &self,
        cx: &TurnCtx<'_>,
        candidates: Vec<MeetingRef>,
    ) -> Result<Step, ChatError> {
        if is_dismissal(cx.text) {
            return Ok(Step::finish(Reply::rephrasable(response::SELECTION_CANCELLED)));
        }
        match rules::identify_meeting(cx.text, &candidates, &cx.tz) {
            Selection::Index(i) => {
                let target = candidates[i].clone();
                let patch = rules::extract_update(cx.text, &target, &cx.tz);
                self.update_or_ask(cx, target, patch).await
            }
            Selection::OutOfRange => Ok(Step::stay(Reply::text(response::SELECTION_OUT_OF_RANGE))),
            Selection::NoMatch => Ok(Step::stay(Reply::text(response::SELECTION_UNCLEAR))),
        }
    }

    pub(crate) async fn resolve_update_details(
        &self,
        cx: &TurnCtx<'_>,
        target: MeetingRef,
    ) -> Result<Step, ChatError> {
        if is_dismissal(cx.text) {
            return Ok(Step::finish(Reply::rephrasable(response::SELECTION_CANCELLED)));
        }
        let patch = self.read_changes(cx, &target).await?;
        if patch.is_empty() {
            return Ok(Step::stay(Reply::text(response::UPDATE_UNCLEAR)));
        }
        self.apply_update(cx, &target, patch).await
    }
}

/// Combine rule and model patches. Model values win; values equal to the
/// target's current ones are dropped.
fn merge_patch(rules: MeetingPatch, model: Option<MeetingPatch>, target: &MeetingRef) -> MeetingPatch {
    let mut patch = rules;
    if let Some(model) = model {
        if model.title.is_some() {
            patch.title = model.title;
        }
        if model.start_time.is_some() {
            patch.start_time = model.start_time;
        }
        if model.duration_minutes.is_some() {
            patch.duration_minutes = model.duration_minutes;
        }
        if model.description.is_some() {
            patch.description = model.description;
        }
        if model.location.is_some() {
            patch.location = model.location;
        }
    }
    if patch.title.as_deref() == Some(target.title.as_str()) {
        patch.title = None;
    }
    if patch.start_time == Some(target.start_time) {
        patch.start_time = None;
    }
    if patch.duration_minutes == Some(target.duration_minutes) {
        patch.duration_minutes = None;
    }
    patch
}
