//! Data collector & flattener.
//!
//! Reads the form into an answer set and merges it with the assignment
//! metadata into the one flat record the spreadsheet receives. Pure: the
//! caller passes the clock reading in.

use crate::{
    assignment::{LoadedAssignment, ParticipantIds},
    clock::{german_local_time, iso_timestamp, whole_seconds},
    error::SurveyResult,
    event::InteractionLog,
    form::FormState,
    questionnaire::{QuestionKind, Questionnaire, AGE_OPT_OUT_SENTINEL},
    types::{Condition, ControlName, UnixMillis},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const EMPTY_CART: &str = "empty";
const UNKNOWN_PARTICIPANT: &str = "UNKNOWN";

/// Control name -> current value. Radio groups with nothing checked are `None`.
pub type AnswerSet = BTreeMap<ControlName, Option<String>>;

/// Snapshot every control's value.
pub fn collect_answers(questionnaire: &Questionnaire, form: &FormState) -> AnswerSet {
    questionnaire
        .questions()
        .map(|(_, q)| {
            let value = match &q.kind {
                QuestionKind::Radio { .. } => {
                    form.value(&q.name).filter(|v| !v.is_empty()).map(str::to_string)
                }
                QuestionKind::Select { .. } => {
                    Some(form.value(&q.name).unwrap_or_default().to_string())
                }
                QuestionKind::AgeComposite { .. } => {
                    if form.opted_out(&q.name) {
                        Some(AGE_OPT_OUT_SENTINEL.to_string())
                    } else {
                        Some(form.value(&q.name).unwrap_or_default().to_string())
                    }
                }
            };
            (q.name.clone(), value)
        })
        .collect()
}

/// `productId:quantity` for every positive quantity, comma joined.
pub fn cart_products(cart: &IndexMap<String, i64>) -> String {
    let items: Vec<String> = cart
        .iter()
        .filter(|(_, qty)| **qty > 0)
        .map(|(id, qty)| format!("{id}:{qty}"))
        .collect();
    if items.is_empty() {
        EMPTY_CART.to_string()
    } else {
        items.join(",")
    }
}

pub fn format_cart_total(total: f64) -> String {
    let total = if total.is_finite() { total } else { 0.0 };
    format!("{total:.2}")
}

pub struct RecordInputs<'a> {
    pub questionnaire: &'a Questionnaire,
    pub answers:       &'a AnswerSet,
    pub loaded:        &'a LoadedAssignment,
    pub ids:           &'a ParticipantIds,
    pub interactions:  &'a InteractionLog,
    pub now:           UnixMillis,
}

/// The flat row sent to the spreadsheet. Built once per submit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub timestamp:               String,
    pub submission_time:         String,
    pub participant_id:          String,
    #[serde(rename = "prolificPID")]
    pub prolific_pid:            String,
    #[serde(rename = "studyID")]
    pub study_id:                String,
    #[serde(rename = "sessionID")]
    pub session_id:              String,
    pub experiment_condition:    Condition,
    pub experiment_group_name:   String,
    pub assignment_source:       String,
    pub time_on_site_seconds:    i64,
    pub cart_products:           String,
    pub cart_total:              String,
    pub survey_duration_seconds: i64,
    pub interaction_events:      String,
    pub experiment_events:       String,
    /// One entry per question, keyed by output name.
    #[serde(flatten)]
    pub answers:                 BTreeMap<String, Option<String>>,
}

impl SubmissionRecord {
    pub fn build(inputs: RecordInputs<'_>) -> SurveyResult<Self> {
        let assignment = &inputs.loaded.assignment;

        let mut answers = BTreeMap::new();
        for (_, q) in inputs.questionnaire.questions() {
            let raw = inputs.answers.get(&q.name).cloned().flatten();
            let value = match &q.absent_sentinel {
                Some(sentinel) => Some(raw.filter(|v| !v.is_empty()).unwrap_or_else(|| sentinel.clone())),
                None => raw,
            };
            answers.insert(q.output_key.clone(), value);
        }

        Ok(Self {
            timestamp:               iso_timestamp(inputs.now),
            submission_time:         german_local_time(inputs.now),
            participant_id:          assignment
                .participant_id
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| UNKNOWN_PARTICIPANT.to_string()),
            prolific_pid:            inputs.ids.prolific_pid.clone(),
            study_id:                inputs.ids.study_id.clone(),
            session_id:              inputs.ids.session_id.clone(),
            experiment_condition:    assignment.condition,
            experiment_group_name:   assignment.condition.group_name().to_string(),
            assignment_source:       inputs.loaded.source.label().to_string(),
            time_on_site_seconds:    whole_seconds(assignment.time_on_site_ms as i64),
            cart_products:           cart_products(&assignment.cart),
            cart_total:              format_cart_total(assignment.cart_total),
            survey_duration_seconds: whole_seconds(inputs.now - inputs.interactions.started_at()),
            interaction_events:      inputs.interactions.to_json()?,
            experiment_events:       serde_json::to_string(&assignment.events)?,
            answers,
        })
    }

    /// Value of an answer field by output name.
    pub fn answer(&self, output_key: &str) -> Option<&str> {
        self.answers.get(output_key).and_then(|v| v.as_deref())
    }

    pub fn to_json(&self) -> SurveyResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
