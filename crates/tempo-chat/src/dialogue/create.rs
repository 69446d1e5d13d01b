use chrono::Duration;

use tempo_schedule::{RescheduleReport, SlotQuery};

use crate::completion::{complete_once, CompletionRequest};
use crate::error::ChatError;
use crate::extract::{rules, ExtractionPurpose, MeetingIntent, MissingField, ModelExtraction};
use crate::response::{self, meeting_line, proposal_summary};
use crate::types::{MeetingRef, PendingAction};

use super::{is_dismissal, parse_confirmation, Confirmation, Vocabulary};
use super::{DialogueEngine, Reply, Step, TurnCtx};

const CLARIFY_SYSTEM: &str = "You are a friendly meeting scheduling assistant. The user wants to \
    schedule a meeting but some details are missing. Ask for exactly the missing details in one or \
    two short sentences. Do not invent values and do not confirm anything yet.";

/// Where in the create flow a message arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CreateStage {
    /// The request that opened the flow.
    Opening,
    /// An answer while details were still missing.
    Details,
    /// New information while a proposal awaited confirmation.
    Revision,
}

impl DialogueEngine {
    pub(crate) async fn handle_create(&self, cx: &TurnCtx<'_>) -> Result<Step, ChatError> {
        let mut intent = MeetingIntent::default();
        intent.absorb_rules(&rules::extract(cx.text, &cx.tz), &cx.tz);

        let meetings = self.active_meetings(cx.user_id).await?;
        match self.model_extract(cx, ExtractionPurpose::Create, &meetings).await {
            Some(ModelExtraction::CreateMeeting(fields)) => {
                intent.overlay(&fields);
            }
            Some(ModelExtraction::SuggestAlternative { fields, reason }) => {
                intent.overlay(&fields);
                if intent.is_complete() {
                    return Ok(self.offer_alternative(cx, intent, reason));
                }
            }
            _ => {}
        }

        self.advance_create(cx, intent, CreateStage::Opening).await
    }

    /// Ask for what is missing. Once complete, the last missing detail
    /// creates the meeting; an opening request or a revision is proposed.
    async fn advance_create(
        &self,
        cx: &TurnCtx<'_>,
        intent: MeetingIntent,
        stage: CreateStage,
    ) -> Result<Step, ChatError> {
        let missing = intent.missing_fields();
        if missing.is_empty() {
            return match stage {
                CreateStage::Details => self.create_meeting(cx, &intent).await,
                CreateStage::Opening | CreateStage::Revision => {
                    self.propose_or_create(cx, intent).await
                }
            };
        }
        let text = self
            .clarification(cx, &intent, &missing, stage == CreateStage::Opening)
            .await;
        Ok(Step::wait_for(
            Reply::text(text),
            PendingAction::AwaitingCreateDetails {
                partial: intent,
                missing,
            },
        ))
    }

    async fn propose_or_create(
        &self,
        cx: &TurnCtx<'_>,
        intent: MeetingIntent,
    ) -> Result<Step, ChatError> {
        if !self.chat.confirm_before_create {
            return self.create_meeting(cx, &intent).await;
        }
        let (Some(start), Some(duration)) = (intent.start_time, intent.duration_minutes) else {
            return Err(ChatError::InvalidState("proposal without start or duration".into()));
        };
        let end = start + Duration::minutes(i64::from(duration));

        let conflicts = self
            .search
            .detector()
            .conflicts_for(cx.user_id, start, end)
            .await?;
        let mut text = String::new();
        if !conflicts.is_empty() {
            let names: Vec<String> = conflicts
                .iter()
                .map(|m| meeting_line(&MeetingRef::from(m), &cx.tz))
                .collect();
            text.push_str(&format!("Heads up: this overlaps with {}.", names.join(", ")));

            let mut attendees = vec![cx.user_id.to_string()];
            for p in &intent.participants {
                if !attendees.contains(p) {
                    attendees.push(p.clone());
                }
            }
            let day = cx.tz.local_date(start);
            let query = SlotQuery::new(
                attendees,
                duration,
                day + Duration::days(1),
                day + Duration::days(7),
            )
            .not_before(cx.tz.now());
            if let Some(slot) = self.search.optimal(&query, &cx.tz).await? {
                text.push_str(&format!(
                    " The best free time in the following week is {}. Tell me the new time if you'd like to use it.",
                    cx.tz.describe(slot.start)
                ));
            }
            text.push('\n');
            tracing::info!(
                user_id = cx.user_id,
                conflicts = conflicts.len(),
                "Proposed meeting overlaps existing meetings"
            );
        }
        text.push_str(&proposal_summary(&intent, &cx.tz));

        Ok(Step::wait_for(
            Reply::text(text),
            PendingAction::AwaitingCreateConfirmation { proposal: intent },
        ))
    }

    fn offer_alternative(
        &self,
        cx: &TurnCtx<'_>,
        intent: MeetingIntent,
        reason: Option<String>,
    ) -> Step {
        let title = intent.title.clone().unwrap_or_default();
        let when = intent
            .start_time
            .map(|s| cx.tz.describe(s))
            .unwrap_or_default();
        tracing::debug!(user_id = cx.user_id, reason = ?reason, "Model suggested an alternative time");
        Step::wait_for(
            Reply::text(format!(
                "The requested time conflicts with an existing meeting. Would you like to schedule '{}' at {} instead? (yes/no)",
                title, when
            )),
            PendingAction::AwaitingCreateConfirmation { proposal: intent },
        )
    }

    async fn create_meeting(&self, cx: &TurnCtx<'_>, intent: &MeetingIntent) -> Result<Step, ChatError> {
        let new = intent
            .to_new_meeting(cx.user_id)
            .ok_or_else(|| ChatError::InvalidState("incomplete meeting proposal".into()))?;
        let meeting = self.store.create(new).await?;
        tracing::info!(
            user_id = cx.user_id,
            meeting_id = %meeting.id,
            title = %meeting.title,
            "Meeting created"
        );

        let report = if self.chat.auto_reschedule_conflicts {
            match self.rescheduler.auto_reschedule(&meeting, &cx.tz).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::warn!(meeting_id = %meeting.id, error = %e, "Auto-reschedule failed");
                    RescheduleReport::default()
                }
            }
        } else {
            RescheduleReport::default()
        };

        let mut text = format!(
            "Perfect! I've scheduled '{}' for {} at {} ({} minutes).",
            meeting.title,
            cx.tz.describe_date(meeting.start_time),
            cx.tz.describe_time(meeting.start_time),
            meeting.duration_minutes
        );
        for moved in &report.rescheduled {
            text.push_str(&format!(
                " I moved '{}' to {} to make room.",
                moved.title,
                cx.tz.describe(moved.new_start_time)
            ));
        }
        for stuck in &report.unresolved {
            text.push_str(&format!(
                " '{}' on {} still overlaps because I couldn't find a free slot for it.",
                stuck.title,
                cx.tz.describe(stuck.start_time)
            ));
        }
        text.push_str(" Is there anything else you'd like me to help you with?");

        Ok(Step::finish(
            Reply::rephrasable(text)
                .with_meetings(vec![meeting])
                .with_report(report),
        ))
    }

    /// Ask the completion service to phrase the question; fixed wording when
    /// it fails or answers out of bounds.
    async fn clarification(
        &self,
        cx: &TurnCtx<'_>,
        intent: &MeetingIntent,
        missing: &[MissingField],
        initial: bool,
    ) -> String {
        let known = serde_json::to_string(intent).unwrap_or_default();
        let user = format!(
            "{}\nKnown details: {}\nMissing details: {}",
            self.prompt_context(cx, &[]),
            known,
            response::join_labels(missing)
        );
        let request = CompletionRequest::with_system(CLARIFY_SYSTEM, user);
        if let Ok(text) = complete_once(self.completion.as_ref(), "clarify", request).await {
            let text = text.trim();
            if self.bounds().accepts(text) {
                return text.to_string();
            }
        }
        if initial {
            response::initial_clarification_fallback(missing)
        } else {
            response::clarification_fallback(missing)
        }
    }

    pub(crate) async fn resolve_create_details(
        &self,
        cx: &TurnCtx<'_>,
        partial: MeetingIntent,
        missing: Vec<MissingField>,
    ) -> Result<Step, ChatError> {
        if is_dismissal(cx.text) {
            return Ok(Step::finish(Reply::rephrasable(response::CREATE_CANCELLED)));
        }

        let mut intent = partial;
        let changed = self.merge_message(cx, &mut intent).await?;
        if !changed {
            if let Some(field) = missing.first() {
                if bare_answer(&mut intent, *field, cx.text) {
                    tracing::debug!(field = %field, "Took reply as a bare answer");
                }
            }
        }
        self.advance_create(cx, intent, CreateStage::Details).await
    }

    pub(crate) async fn resolve_create_confirmation(
        &self,
        cx: &TurnCtx<'_>,
        proposal: MeetingIntent,
    ) -> Result<Step, ChatError> {
        match parse_confirmation(cx.text, Vocabulary::Create) {
            Confirmation::Yes => self.create_meeting(cx, &proposal).await,
            Confirmation::No => Ok(Step::finish(Reply::rephrasable(response::CREATE_CANCELLED))),
            Confirmation::AddInfo => Ok(Step::stay(Reply::text(response::CREATE_ADD_INFO))),
            Confirmation::Unclear => {
                let mut intent = proposal.clone();
                if self.merge_message(cx, &mut intent).await? {
                    self.advance_create(cx, intent, CreateStage::Revision).await
                } else {
                    Ok(Step::stay(Reply::text(proposal_summary(&proposal, &cx.tz))))
                }
            }
        }
    }

    /// Fold rule and model extraction of the current message into `intent`.
    async fn merge_message(&self, cx: &TurnCtx<'_>, intent: &mut MeetingIntent) -> Result<bool, ChatError> {
        let mut changed = intent.absorb_rules(&rules::extract(cx.text, &cx.tz), &cx.tz);
        let meetings = self.active_meetings(cx.user_id).await?;
        match self.model_extract(cx, ExtractionPurpose::Create, &meetings).await {
            Some(ModelExtraction::CreateMeeting(fields))
            | Some(ModelExtraction::SuggestAlternative { fields, .. }) => {
                changed |= intent.overlay(&fields);
            }
            _ => {}
        }
        Ok(changed)
    }
}

/// Interpret a reply that matched no pattern as the answer to `field`.
fn bare_answer(intent: &mut MeetingIntent, field: MissingField, text: &str) -> bool {
    let text = text.trim().trim_end_matches(['.', '!']);
    match field {
        MissingField::Title => {
            if text.is_empty() {
                return false;
            }
            intent.title = Some(text.to_string());
            true
        }
        MissingField::Participants => {
            let names: Vec<String> = text
                .split([',', ';'])
                .flat_map(|part| part.split(" and "))
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect();
            if names.is_empty() {
                return false;
            }
            intent.participants.extend(names);
            true
        }
        MissingField::Duration => match text.parse::<u32>() {
            Ok(minutes) if minutes > 0 => {
                intent.duration_minutes = Some(minutes);
                true
            }
            _ => false,
        },
        MissingField::DateTime => false,
    }
}
