use crate::{questionnaire::Questionnaire, visibility::VisibilityPolicy};
use serde::{Deserialize, Serialize};

/// Spreadsheet ingestion web app the study collects into.
pub const DEFAULT_ENDPOINT_URL: &str = "https://script.google.com/macros/s/AKfycbylAjyhtWSg-Y_U202Dpqt_DRMfJxIG9gHvzb_N-kZSazvPqo5YedeUj7uJRaesaQgT/exec";

/// Everything that differs between deployments of the survey.
/// Missing keys in a config file fall back to `Default`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SurveyConfig {
    /// Spreadsheet ingestion web app.
    pub endpoint_url:           String,
    pub thank_you_url:          String,
    pub conditional_visibility: VisibilityPolicy,
    pub submit_label:           String,
    pub submitting_label:       String,
    /// Blocking notice shown when delivery fails.
    pub failure_notice:         String,
    pub connect_timeout_ms:     u64,
    pub request_timeout_ms:     u64,
    /// SQLite file backing durable storage.
    pub local_store_path:       String,
    /// JSON block list replacing the built-in questionnaire.
    pub questionnaire_path:     Option<String>,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            endpoint_url:           DEFAULT_ENDPOINT_URL.into(),
            thank_you_url:          "thank-you.html".into(),
            conditional_visibility: VisibilityPolicy::Conditional,
            submit_label:           "Umfrage absenden".into(),
            submitting_label:       "Wird gesendet...".into(),
            failure_notice:         "Es gab einen Fehler beim Absenden der Umfrage. Bitte versuchen Sie es \
                                     erneut oder kontaktieren Sie den Administrator."
                .into(),
            connect_timeout_ms:     10_000,
            request_timeout_ms:     30_000,
            local_store_path:       "survey-local.db".into(),
            questionnaire_path:     None,
        }
    }
}

impl SurveyConfig {
    /// Load from a JSON file.
    /// In tests, use SurveyConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: SurveyConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {path}: {e}"))?;
        Ok(config)
    }

    /// Config pointing nowhere real, for unit tests.
    pub fn default_test() -> Self {
        Self {
            endpoint_url:       "http://127.0.0.1:9/exec".into(),
            local_store_path:   ":memory:".into(),
            connect_timeout_ms: 200,
            request_timeout_ms: 200,
            ..Self::default()
        }
    }

    /// The questionnaire this deployment asks.
    pub fn questionnaire(&self) -> anyhow::Result<Questionnaire> {
        match &self.questionnaire_path {
            None => Ok(Questionnaire::standard()),
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
                Questionnaire::from_json(&content)
                    .map_err(|e| anyhow::anyhow!("Invalid questionnaire {path}: {e}"))
            }
        }
    }
}
