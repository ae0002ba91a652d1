//! Participant inputs and the interaction log they leave behind.
//!
//! RULE: The session applies inputs ONLY through FormInput dispatch.
//! The interaction log is append-only for the lifetime of the page.

use crate::{
    error::SurveyResult,
    types::{ControlName, UnixMillis},
};
use serde::{Deserialize, Serialize};

/// Every change a participant can make to the form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "input", rename_all = "snake_case")]
pub enum FormInput {
    /// Check a radio option or pick a select option.
    Choose { question: ControlName, value: String },
    Clear { question: ControlName },
    AgeText { question: ControlName, text: String },
    AgeOptOut { question: ControlName, checked: bool },
}

impl FormInput {
    pub fn question(&self) -> &str {
        match self {
            Self::Choose { question, .. }
            | Self::Clear { question }
            | Self::AgeText { question, .. }
            | Self::AgeOptOut { question, .. } => question,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    SurveyStart,
    Change,
    Checkbox,
    PageUnload,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    #[serde(rename = "type")]
    pub kind:            InteractionKind,
    pub question_id:     String,
    pub value:           serde_json::Value,
    pub timestamp:       UnixMillis,
    pub time_from_start: i64,
}

#[derive(Debug, Clone)]
pub struct InteractionLog {
    started_at: UnixMillis,
    events:     Vec<InteractionEvent>,
}

impl InteractionLog {
    pub fn new(started_at: UnixMillis) -> Self {
        Self { started_at, events: Vec::new() }
    }

    pub fn started_at(&self) -> UnixMillis {
        self.started_at
    }

    pub fn record(
        &mut self,
        kind: InteractionKind,
        question_id: &str,
        value: impl Into<serde_json::Value>,
        now: UnixMillis,
    ) {
        self.events.push(InteractionEvent {
            kind,
            question_id:     question_id.to_string(),
            value:           value.into(),
            timestamp:       now,
            time_from_start: now - self.started_at,
        });
    }

    pub fn events(&self) -> &[InteractionEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The log as a JSON array string, the shape stored in the record.
    pub fn to_json(&self) -> SurveyResult<String> {
        Ok(serde_json::to_string(&self.events)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_offset_from_start() {
        let mut log = InteractionLog::new(10_000);
        log.record(InteractionKind::SurveyStart, "init", 3, 10_000);
        log.record(InteractionKind::Change, "q06_attraktiv", "5", 12_500);
        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[1].time_from_start, 2_500);

        let json = log.to_json().unwrap();
        assert!(json.contains(r#""type":"change""#));
        assert!(json.contains(r#""questionId":"q06_attraktiv""#));
        assert!(json.contains(r#""timeFromStart":2500"#));
    }

    #[test]
    fn inputs_parse_from_tagged_json() {
        let input: FormInput =
            serde_json::from_str(r#"{"input":"age_opt_out","question":"q16_alter","checked":true}"#).unwrap();
        assert_eq!(input.question(), "q16_alter");
        assert_eq!(
            input,
            FormInput::AgeOptOut { question: "q16_alter".into(), checked: true }
        );
    }
}
