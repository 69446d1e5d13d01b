use crate::error::ChatError;
use crate::response::{self, meeting_line, numbered_list};

use super::{refs, DialogueEngine, Reply, Step, TurnCtx};

impl DialogueEngine {
    pub(crate) async fn handle_view(&self, cx: &TurnCtx<'_>) -> Result<Step, ChatError> {
        let meetings = self.active_meetings(cx.user_id).await?;
        let listed = refs(&meetings);
        let reply = match listed.as_slice() {
            [] => Reply::rephrasable(response::NO_MEETINGS),
            [only] => Reply::rephrasable(format!(
                "You have one meeting scheduled: {}. {}",
                meeting_line(only, &cx.tz),
                response::VIEW_FOLLOW_UP
            )),
            many => Reply::text(format!(
                "You have {} meetings scheduled:\n{}\n{}",
                many.len(),
                numbered_list(many, &cx.tz),
                response::VIEW_FOLLOW_UP
            )),
        };
        Ok(Step::finish(reply.with_meetings(meetings)))
    }
}
