//! Structured extraction through the completion service.
//!
//! The model is asked for a single JSON object with an `action` tag. Its
//! reply is parsed into [`RawExtraction`], then validated into a typed
//! [`ModelExtraction`]. Timestamps become UTC instants here, before any
//! handler sees them.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use tempo_core::time::TimeContext;
use tempo_core::types::MeetingPatch;

use crate::completion::{complete_once, CompletionClient, CompletionRequest};
use crate::error::ExtractionError;

/// Which handler is asking, and so which actions it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPurpose {
    Create,
    Update,
    Delete,
}

impl ExtractionPurpose {
    pub fn actions(&self) -> &'static [&'static str] {
        match self {
            ExtractionPurpose::Create => &["create_meeting", "suggest_alternative"],
            ExtractionPurpose::Update => &["update_meeting"],
            ExtractionPurpose::Delete => &["delete_meeting", "clarify_delete"],
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ExtractionPurpose::Create => "extract_create",
            ExtractionPurpose::Update => "extract_update",
            ExtractionPurpose::Delete => "extract_delete",
        }
    }

    fn instructions(&self) -> &'static str {
        match self {
            ExtractionPurpose::Create => {
                "The user wants to schedule a meeting. Reply with ONE JSON object and nothing else:\n\
                 {\"action\": \"create_meeting\", \"title\": string|null, \"start_time\": \"YYYY-MM-DDTHH:MM:SS\"|null, \
                 \"duration_minutes\": number|null, \"participants\": [string], \"description\": string|null, \"location\": string|null}\n\
                 If the requested time clashes with an existing meeting, use \"action\": \"suggest_alternative\" with \
                 the same fields, a free start_time, and a short \"reason\".\n\
                 Use null for anything the user has not said. Times are local."
            }
            ExtractionPurpose::Update => {
                "The user wants to change an existing meeting. Reply with ONE JSON object and nothing else:\n\
                 {\"action\": \"update_meeting\", \"target_title\": string|null, \"target_start_time\": \"YYYY-MM-DDTHH:MM:SS\"|null, \
                 \"updates\": {\"title\": string|null, \"start_time\": \"YYYY-MM-DDTHH:MM:SS\"|null, \"duration_minutes\": number|null, \
                 \"description\": string|null, \"location\": string|null}}\n\
                 Use null for anything the user has not said. Times are local."
            }
            ExtractionPurpose::Delete => {
                "The user wants to cancel a meeting. Reply with ONE JSON object and nothing else:\n\
                 {\"action\": \"delete_meeting\", \"target_title\": string|null, \"target_start_time\": \"YYYY-MM-DDTHH:MM:SS\"|null}\n\
                 If you cannot tell which meeting is meant, reply {\"action\": \"clarify_delete\", \"missing\": \"<what you need>\"}.\n\
                 Times are local."
            }
        }
    }
}

/// A model reply as parsed, before validation. Field types are loose on
/// purpose: models send numbers as strings and lists as comma text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawExtraction {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<Value>,
    #[serde(default)]
    pub participants: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub target_title: Option<String>,
    #[serde(default)]
    pub target_start_time: Option<String>,
    #[serde(default)]
    pub updates: Option<RawUpdates>,
    #[serde(default)]
    pub missing: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUpdates {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Meeting fields proposed by the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelFields {
    pub title: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<u32>,
    pub participants: Vec<String>,
    pub description: Option<String>,
    pub location: Option<String>,
}

/// A validated model extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelExtraction {
    CreateMeeting(ModelFields),
    SuggestAlternative {
        fields: ModelFields,
        reason: Option<String>,
    },
    UpdateMeeting {
        target_title: Option<String>,
        target_start: Option<DateTime<Utc>>,
        patch: MeetingPatch,
    },
    DeleteMeeting {
        target_title: Option<String>,
        target_start: Option<DateTime<Utc>>,
    },
    ClarifyDelete {
        missing: String,
    },
}

// =============================================================================
// Reply recovery
// =============================================================================

static PY_LITERAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(True|False|None)\b").expect("Invalid literal regex"));

static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("Invalid comma regex"));

/// Parse a model reply. Tries the reply as-is, then the outermost `{...}`
/// span, then a permissive rewrite of that span.
pub fn parse_reply(text: &str) -> Result<RawExtraction, ExtractionError> {
    if let Ok(raw) = serde_json::from_str::<RawExtraction>(text.trim()) {
        return Ok(raw);
    }
    let object = outermost_object(text).ok_or(ExtractionError::NoJson)?;
    if let Ok(raw) = serde_json::from_str::<RawExtraction>(object) {
        return Ok(raw);
    }
    let relaxed = relax(object);
    serde_json::from_str::<RawExtraction>(&relaxed)
        .map_err(|e| ExtractionError::Malformed(e.to_string()))
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Python-literal style to JSON: single quotes, `True`/`False`/`None`,
/// trailing commas.
fn relax(object: &str) -> String {
    let quoted = object.replace('\'', "\"");
    let literals = PY_LITERAL_RE.replace_all(&quoted, |caps: &regex::Captures| {
        match &caps[1] {
            "True" => "true",
            "False" => "false",
            _ => "null",
        }
        .to_string()
    });
    TRAILING_COMMA_RE.replace_all(&literals, "$1").into_owned()
}

// =============================================================================
// Validation
// =============================================================================

/// Check the action tag against `purpose` and convert fields to typed values.
pub fn validate(
    raw: RawExtraction,
    purpose: ExtractionPurpose,
    tz: &TimeContext,
) -> Result<ModelExtraction, ExtractionError> {
    let action = raw
        .action
        .as_deref()
        .map(|a| a.trim().to_lowercase())
        .filter(|a| !a.is_empty())
        .ok_or(ExtractionError::MissingAction)?;
    if !purpose.actions().contains(&action.as_str()) {
        return Err(ExtractionError::UnexpectedAction(action));
    }

    match action.as_str() {
        "create_meeting" => Ok(ModelExtraction::CreateMeeting(fields(&raw, tz)?)),
        "suggest_alternative" => {
            let fields = fields(&raw, tz)?;
            if fields.start_time.is_none() {
                return Err(ExtractionError::InvalidField {
                    field: "start_time",
                    reason: "alternative without a time".to_string(),
                });
            }
            Ok(ModelExtraction::SuggestAlternative {
                fields,
                reason: non_empty(raw.reason),
            })
        }
        "update_meeting" => {
            let updates = raw.updates.clone().unwrap_or_default();
            let patch = MeetingPatch {
                title: non_empty(updates.title),
                description: non_empty(updates.description),
                location: non_empty(updates.location),
                start_time: timestamp("updates.start_time", updates.start_time.as_deref(), tz)?,
                duration_minutes: minutes(updates.duration_minutes.as_ref())?,
                ..Default::default()
            };
            Ok(ModelExtraction::UpdateMeeting {
                target_title: non_empty(raw.target_title.clone()),
                target_start: timestamp("target_start_time", raw.target_start_time.as_deref(), tz)?,
                patch,
            })
        }
        "delete_meeting" => Ok(ModelExtraction::DeleteMeeting {
            target_title: non_empty(raw.target_title.clone()),
            target_start: timestamp("target_start_time", raw.target_start_time.as_deref(), tz)?,
        }),
        "clarify_delete" => Ok(ModelExtraction::ClarifyDelete {
            missing: non_empty(raw.missing)
                .unwrap_or_else(|| "meeting title or time".to_string()),
        }),
        other => Err(ExtractionError::UnexpectedAction(other.to_string())),
    }
}

fn fields(raw: &RawExtraction, tz: &TimeContext) -> Result<ModelFields, ExtractionError> {
    Ok(ModelFields {
        title: non_empty(raw.title.clone()),
        start_time: timestamp("start_time", raw.start_time.as_deref(), tz)?,
        duration_minutes: minutes(raw.duration_minutes.as_ref())?,
        participants: participants(raw.participants.as_ref()),
        description: non_empty(raw.description.clone()),
        location: non_empty(raw.location.clone()),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

/// RFC 3339 instants keep their offset; naive readings are local time.
fn timestamp(
    field: &'static str,
    value: Option<&str>,
    tz: &TimeContext,
) -> Result<Option<DateTime<Utc>>, ExtractionError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(instant.with_timezone(&Utc)));
    }
    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|local| Some(tz.from_local(local)))
        .ok_or_else(|| ExtractionError::InvalidField {
            field,
            reason: format!("unrecognized timestamp '{}'", value),
        })
}

fn minutes(value: Option<&Value>) -> Result<Option<u32>, ExtractionError> {
    let invalid = |reason: String| ExtractionError::InvalidField {
        field: "duration_minutes",
        reason,
    };
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            let m = n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
                .ok_or_else(|| invalid(format!("negative duration {}", n)))?;
            u32::try_from(m)
                .ok()
                .filter(|m| *m > 0)
                .map(Some)
                .ok_or_else(|| invalid(format!("duration out of range: {}", m)))
        }
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .trim_end_matches("minutes")
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|m| *m > 0)
            .map(Some)
            .ok_or_else(|| invalid(format!("not a duration: '{}'", s))),
        Some(other) => Err(invalid(format!("unexpected type: {}", other))),
    }
}

fn participants(value: Option<&Value>) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

// =============================================================================
// Completion call
// =============================================================================

pub fn build_request(purpose: ExtractionPurpose, context: &str) -> CompletionRequest {
    CompletionRequest::with_system(purpose.instructions(), context).temperature(0.0)
}

/// Ask the model for a structured extraction. Any failure (service, parse
/// or validation) is logged and yields `None`, so callers fall back to the
/// rule-based result.
pub async fn extract_with_model(
    client: &dyn CompletionClient,
    purpose: ExtractionPurpose,
    context: &str,
    tz: &TimeContext,
) -> Option<ModelExtraction> {
    let reply = complete_once(client, purpose.label(), build_request(purpose, context))
        .await
        .ok()?;
    match parse_reply(&reply).and_then(|raw| validate(raw, purpose, tz)) {
        Ok(extraction) => Some(extraction),
        Err(e) => {
            tracing::warn!(purpose = purpose.label(), error = %e, "Discarding model extraction");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tz() -> TimeContext {
        TimeContext::utc(Utc.with_ymd_and_hms(2024, 6, 11, 8, 0, 0).unwrap())
    }

    // ---- Recovery ----

    #[test]
    fn test_parse_direct_json() {
        let raw = parse_reply(r#"{"action":"create_meeting","title":"Sync"}"#).unwrap();
        assert_eq!(raw.action.as_deref(), Some("create_meeting"));
        assert_eq!(raw.title.as_deref(), Some("Sync"));
    }

    #[test]
    fn test_parse_embedded_object() {
        let reply = "Sure! Here you go:\n```json\n{\"action\": \"delete_meeting\", \"target_title\": \"Budget\"}\n```";
        let raw = parse_reply(reply).unwrap();
        assert_eq!(raw.target_title.as_deref(), Some("Budget"));
    }

    #[test]
    fn test_parse_python_literal() {
        let reply = "{'action': 'create_meeting', 'title': None, 'participants': ['a@b.com',],}";
        let raw = parse_reply(reply).unwrap();
        assert_eq!(raw.action.as_deref(), Some("create_meeting"));
        assert!(raw.title.is_none());
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(
            parse_reply("I can't help with that"),
            Err(ExtractionError::NoJson)
        ));
        assert!(matches!(
            parse_reply("{not json at all"),
            Err(ExtractionError::NoJson)
        ));
        assert!(matches!(
            parse_reply("{ action: ??? }"),
            Err(ExtractionError::Malformed(_))
        ));
    }

    // ---- Validation ----

    #[test]
    fn test_validate_create_converts_fields() {
        let raw = parse_reply(
            r#"{"action":"create_meeting","title":"Sync","start_time":"2024-06-12T14:00:00",
                "duration_minutes":"30","participants":"a@b.com, c@d.com"}"#,
        )
        .unwrap();
        let ModelExtraction::CreateMeeting(fields) =
            validate(raw, ExtractionPurpose::Create, &tz()).unwrap()
        else {
            panic!("expected create");
        };
        assert_eq!(fields.title.as_deref(), Some("Sync"));
        assert_eq!(
            fields.start_time,
            Some(Utc.with_ymd_and_hms(2024, 6, 12, 14, 0, 0).unwrap())
        );
        assert_eq!(fields.duration_minutes, Some(30));
        assert_eq!(fields.participants, vec!["a@b.com", "c@d.com"]);
    }

    #[test]
    fn test_validate_naive_time_uses_offset() {
        let tz = TimeContext::new(Utc.with_ymd_and_hms(2024, 6, 11, 8, 0, 0).unwrap(), 120);
        let raw = parse_reply(r#"{"action":"create_meeting","start_time":"2024-06-12 14:00"}"#).unwrap();
        let ModelExtraction::CreateMeeting(fields) =
            validate(raw, ExtractionPurpose::Create, &tz).unwrap()
        else {
            panic!("expected create");
        };
        assert_eq!(
            fields.start_time,
            Some(Utc.with_ymd_and_hms(2024, 6, 12, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_validate_rejects_foreign_action() {
        let raw = parse_reply(r#"{"action":"delete_meeting"}"#).unwrap();
        assert!(matches!(
            validate(raw, ExtractionPurpose::Create, &tz()),
            Err(ExtractionError::UnexpectedAction(a)) if a == "delete_meeting"
        ));
        let raw = parse_reply(r#"{"title":"x"}"#).unwrap();
        assert!(matches!(
            validate(raw, ExtractionPurpose::Create, &tz()),
            Err(ExtractionError::MissingAction)
        ));
    }

    #[test]
    fn test_validate_bad_timestamp() {
        let raw = parse_reply(r#"{"action":"create_meeting","start_time":"next tuesday-ish"}"#).unwrap();
        assert!(matches!(
            validate(raw, ExtractionPurpose::Create, &tz()),
            Err(ExtractionError::InvalidField { field: "start_time", .. })
        ));
    }

    #[test]
    fn test_validate_update_patch() {
        let raw = parse_reply(
            r#"{"action":"update_meeting","target_title":"Standup",
                "updates":{"start_time":"2024-06-12T15:00:00Z","duration_minutes":45}}"#,
        )
        .unwrap();
        let ModelExtraction::UpdateMeeting { target_title, patch, .. } =
            validate(raw, ExtractionPurpose::Update, &tz()).unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(target_title.as_deref(), Some("Standup"));
        assert_eq!(patch.duration_minutes, Some(45));
        assert!(patch.start_time.is_some());
        assert!(patch.title.is_none());
    }

    #[test]
    fn test_validate_clarify_and_suggest() {
        let raw = parse_reply(r#"{"action":"clarify_delete","missing":"date"}"#).unwrap();
        assert_eq!(
            validate(raw, ExtractionPurpose::Delete, &tz()).unwrap(),
            ModelExtraction::ClarifyDelete {
                missing: "date".to_string()
            }
        );
        let raw = parse_reply(r#"{"action":"suggest_alternative"}"#).unwrap();
        assert!(validate(raw, ExtractionPurpose::Create, &tz()).is_err());
    }

    #[test]
    fn test_minutes_forms() {
        assert_eq!(minutes(Some(&serde_json::json!(30))).unwrap(), Some(30));
        assert_eq!(minutes(Some(&serde_json::json!(29.6))).unwrap(), Some(30));
        assert_eq!(minutes(Some(&serde_json::json!("45 minutes"))).unwrap(), Some(45));
        assert_eq!(minutes(Some(&Value::Null)).unwrap(), None);
        assert!(minutes(Some(&serde_json::json!(0))).is_err());
        assert!(minutes(Some(&serde_json::json!(-5))).is_err());
    }
}
