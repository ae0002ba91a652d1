//! Assignment loader — which condition and shop-session metadata apply.
//!
//! Resolution order:
//!   1. `experimentData` JSON in session storage (written by the shop page)
//!   2. a condition query parameter (`condition`, `group`, `groupId`)
//!   3. a labelled fallback in the control group
//!
//! Loading never fails outward. Every degraded path is logged and visible
//! through `AssignmentSource`.

use crate::{
    storage::{KeyValueStorage, EXPERIMENT_DATA_KEY, PROLIFIC_PID_KEY, SESSION_ID_KEY, STUDY_ID_KEY},
    types::{Condition, UnixMillis},
};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Accepted query parameter names, highest priority first.
pub const CONDITION_PARAMS: [&str; 3] = ["condition", "group", "groupId"];

const MISSING_ID: &str = "N/A";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentAssignment {
    #[serde(default)]
    pub participant_id:  Option<String>,
    pub condition:       Condition,
    #[serde(default)]
    pub start_ts:        Option<UnixMillis>,
    #[serde(default)]
    pub end_ts:          Option<UnixMillis>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub time_on_site_ms: f64,
    /// productId -> quantity, in the order the shop wrote it.
    #[serde(default, deserialize_with = "null_as_default")]
    pub cart:            IndexMap<String, i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cart_total:      f64,
    /// The shop page's own event log, passed through untouched.
    #[serde(default, deserialize_with = "null_as_default")]
    pub events:          Vec<serde_json::Value>,
    #[serde(default, rename = "prolificPID", skip_serializing_if = "Option::is_none")]
    pub prolific_pid:    Option<String>,
    #[serde(default, rename = "studyID", skip_serializing_if = "Option::is_none")]
    pub study_id:        Option<String>,
    #[serde(default, rename = "sessionID", skip_serializing_if = "Option::is_none")]
    pub session_id:      Option<String>,
}

impl ExperimentAssignment {
    /// A minimal assignment with empty cart and zero time on site.
    pub fn synthesized(participant_id: String, condition: Condition, now: UnixMillis) -> Self {
        Self {
            participant_id:  Some(participant_id),
            condition,
            start_ts:        Some(now),
            end_ts:          Some(now),
            time_on_site_ms: 0.0,
            cart:            IndexMap::new(),
            cart_total:      0.0,
            events:          Vec::new(),
            prolific_pid:    None,
            study_id:        None,
            session_id:      None,
        }
    }
}

/// The shop page writes `null` for values it never filled in.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentSource {
    SessionStorage,
    QueryParameter { name: String },
    Fallback,
}

impl AssignmentSource {
    /// Short label written to the submission record.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SessionStorage       => "session",
            Self::QueryParameter { .. } => "url",
            Self::Fallback             => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedAssignment {
    pub assignment: ExperimentAssignment,
    pub source:     AssignmentSource,
}

impl LoadedAssignment {
    /// False when no upstream signal was found and the fallback was used.
    pub fn is_resolved(&self) -> bool {
        self.source != AssignmentSource::Fallback
    }

    pub fn condition(&self) -> Condition {
        self.assignment.condition
    }
}

pub struct AssignmentLoader;

impl AssignmentLoader {
    /// `query` may be a bare query string (with or without `?`) or a full URL.
    pub fn load(session: &dyn KeyValueStorage, query: &str, now: UnixMillis) -> LoadedAssignment {
        if let Some(assignment) = Self::from_session(session) {
            log::info!(
                "assignment loaded from session storage: participant={:?} condition={} time_on_site_ms={}",
                assignment.participant_id,
                assignment.condition,
                assignment.time_on_site_ms
            );
            return LoadedAssignment { assignment, source: AssignmentSource::SessionStorage };
        }

        if let Some((name, condition)) = condition_from_query(query) {
            log::warn!("assignment taken from query parameter '{name}' (direct access): condition={condition}");
            return LoadedAssignment {
                assignment: ExperimentAssignment::synthesized(
                    format!("DIRECT_ACCESS_{now}"),
                    condition,
                    now,
                ),
                source: AssignmentSource::QueryParameter { name },
            };
        }

        let assignment =
            ExperimentAssignment::synthesized(format!("FALLBACK_{now}"), Condition::Control, now);
        log::warn!(
            "no experiment data found; using control group fallback, participant={:?}",
            assignment.participant_id
        );
        LoadedAssignment { assignment, source: AssignmentSource::Fallback }
    }

    fn from_session(session: &dyn KeyValueStorage) -> Option<ExperimentAssignment> {
        let raw = match session.get(EXPERIMENT_DATA_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("session storage unreadable: {e}");
                return None;
            }
        };
        match serde_json::from_str::<ExperimentAssignment>(&raw) {
            Ok(a) => Some(a),
            Err(e) => {
                log::warn!("stored experiment data rejected: {e}");
                None
            }
        }
    }
}

/// First accepted parameter whose value is a valid condition code.
fn condition_from_query(query: &str) -> Option<(String, Condition)> {
    let raw = if query.contains("://") {
        match url::Url::parse(query) {
            Ok(u) => u.query().unwrap_or_default().to_string(),
            Err(e) => {
                log::warn!("location '{query}' is not a valid URL: {e}");
                return None;
            }
        }
    } else {
        query.trim_start_matches('?').to_string()
    };

    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect();

    CONDITION_PARAMS.iter().find_map(|name| {
        let value = pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v)?;
        if value.is_empty() {
            return None;
        }
        match value.parse::<Condition>() {
            Ok(c) => Some((name.to_string(), c)),
            Err(e) => {
                log::warn!("ignoring query parameter '{name}': {e}");
                None
            }
        }
    })
}

/// Prolific identifiers: the assignment's own value, else the session key
/// of the same name, else `N/A`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantIds {
    pub prolific_pid: String,
    pub study_id:     String,
    pub session_id:   String,
}

impl ParticipantIds {
    pub fn resolve(assignment: &ExperimentAssignment, session: &dyn KeyValueStorage) -> Self {
        let pick = |own: &Option<String>, key: &str| -> String {
            own.clone()
                .filter(|v| !v.is_empty())
                .or_else(|| session.get(key).ok().flatten().filter(|v| !v.is_empty()))
                .unwrap_or_else(|| MISSING_ID.to_string())
        };
        Self {
            prolific_pid: pick(&assignment.prolific_pid, PROLIFIC_PID_KEY),
            study_id:     pick(&assignment.study_id, STUDY_ID_KEY),
            session_id:   pick(&assignment.session_id, SESSION_ID_KEY),
        }
    }
}
