//! Key/value storage seam.
//!
//! The survey talks to two scopes: a session scope that dies with the tab
//! (experiment hand-over, completion marker) and a durable scope that
//! outlives it (failed submissions). Both are plain string key/value maps.

use crate::error::SurveyResult;
use std::collections::BTreeMap;

// ── Well-known keys ───────────────────────────────────────────────

/// Session key holding the shop page's experiment JSON.
pub const EXPERIMENT_DATA_KEY: &str = "experimentData";
/// Session key set once the record has been dispatched.
pub const SURVEY_COMPLETED_KEY: &str = "surveyCompleted";
/// Durable key prefix for records that could not be sent.
pub const FAILED_SUBMISSION_PREFIX: &str = "surveyData_failed_";

pub const PROLIFIC_PID_KEY: &str = "prolificPID";
pub const STUDY_ID_KEY: &str = "studyID";
pub const SESSION_ID_KEY: &str = "sessionID";

pub trait KeyValueStorage {
    fn get(&self, key: &str) -> SurveyResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> SurveyResult<()>;
    fn remove(&mut self, key: &str) -> SurveyResult<()>;
    /// Keys starting with `prefix`, in ascending order.
    fn keys_with_prefix(&self, prefix: &str) -> SurveyResult<Vec<String>>;
}

/// In-process storage. Used for the session scope and in tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> SurveyResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> SurveyResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> SurveyResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> SurveyResult<Vec<String>> {
        Ok(self
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

impl<S: KeyValueStorage + ?Sized> KeyValueStorage for Box<S> {
    fn get(&self, key: &str) -> SurveyResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> SurveyResult<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> SurveyResult<()> {
        (**self).remove(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> SurveyResult<Vec<String>> {
        (**self).keys_with_prefix(prefix)
    }
}
