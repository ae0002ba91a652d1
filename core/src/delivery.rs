//! Delivery sink — one POST to the spreadsheet endpoint, local fallback
//! on failure.
//!
//! The endpoint is called in opaque mode: whatever HTTP status comes back
//! is not inspected. `Dispatched` therefore means "the request left",
//! never "the row was written". Only transport failures are observable.

use crate::{
    error::{SurveyError, SurveyResult},
    record::SubmissionRecord,
    storage::{KeyValueStorage, FAILED_SUBMISSION_PREFIX},
    types::UnixMillis,
};
use serde::Serialize;
use std::time::Duration;

pub trait Transport {
    /// POST `body` as JSON to `url`. `Ok` only confirms dispatch.
    fn post_json(&self, url: &str, body: &str) -> SurveyResult<()>;
}

/// Blocking HTTP transport. Timeouts bound the single attempt.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(connect_timeout_ms: u64, request_timeout_ms: u64) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_millis(connect_timeout_ms))
            .timeout_read(Duration::from_millis(request_timeout_ms))
            .timeout_write(Duration::from_millis(request_timeout_ms))
            .build();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn post_json(&self, url: &str, body: &str) -> SurveyResult<()> {
        match self
            .agent
            .post(url)
            .set("content-type", "application/json")
            .send_string(body)
        {
            Ok(_) => Ok(()),
            // Opaque mode: a status code is still a completed dispatch.
            Err(ureq::Error::Status(_, _)) => Ok(()),
            Err(ureq::Error::Transport(transport)) => Err(SurveyError::Transport(transport.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Request sent. Not proof that the remote side accepted it.
    Dispatched,
    TransportFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub outcome:      DeliveryOutcome,
    pub detail:       String,
    /// Durable key the record was preserved under, if it had to be.
    pub fallback_key: Option<String>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> bool {
        self.outcome == DeliveryOutcome::Dispatched
    }
}

pub struct DeliverySink<T: Transport, S: KeyValueStorage> {
    transport: T,
    endpoint:  String,
    fallback:  S,
}

impl<T: Transport, S: KeyValueStorage> DeliverySink<T, S> {
    pub fn new(transport: T, endpoint: impl Into<String>, fallback: S) -> Self {
        Self { transport, endpoint: endpoint.into(), fallback }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Durable storage receiving undeliverable records.
    pub fn fallback_store(&self) -> &S {
        &self.fallback
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Single attempt. Never retries.
    pub fn deliver(&mut self, record: &SubmissionRecord, now: UnixMillis) -> DeliveryReport {
        let body = match record.to_json() {
            Ok(body) => body,
            Err(e) => {
                log::error!("submission record could not be encoded: {e}");
                return DeliveryReport {
                    outcome:      DeliveryOutcome::TransportFailed { reason: e.to_string() },
                    detail:       "record could not be encoded".to_string(),
                    fallback_key: None,
                };
            }
        };

        log::info!("sending submission for {} to {}", record.participant_id, self.endpoint);
        match self.transport.post_json(&self.endpoint, &body) {
            Ok(()) => {
                log::info!("submission dispatched");
                DeliveryReport {
                    outcome:      DeliveryOutcome::Dispatched,
                    detail:       "request dispatched; remote acceptance not observable".to_string(),
                    fallback_key: None,
                }
            }
            Err(e) => {
                let reason = e.to_string();
                log::warn!("submission failed: {reason}");
                let (detail, fallback_key) = match self.preserve(&body, now) {
                    Ok(key) => {
                        log::info!("submission preserved locally under {key}");
                        (format!("saved locally under {key}"), Some(key))
                    }
                    Err(store_err) => {
                        log::error!("local fallback write failed, record lost: {store_err}");
                        (format!("local fallback write failed: {store_err}"), None)
                    }
                };
                DeliveryReport {
                    outcome: DeliveryOutcome::TransportFailed { reason },
                    detail,
                    fallback_key,
                }
            }
        }
    }

    /// Write `body` under `surveyData_failed_<ms>`, stepping past keys
    /// already taken in the same millisecond.
    fn preserve(&mut self, body: &str, now: UnixMillis) -> SurveyResult<String> {
        let mut ts = now;
        let mut key = format!("{FAILED_SUBMISSION_PREFIX}{ts}");
        while self.fallback.get(&key)?.is_some() {
            ts += 1;
            key = format!("{FAILED_SUBMISSION_PREFIX}{ts}");
        }
        self.fallback.set(&key, body)?;
        Ok(key)
    }
}
