//! Submission orchestrator — the session context that owns one page visit.
//!
//! PHASES:
//!   Idle -> Validating -> Idle                  (invalid, errors shown)
//!   Idle -> Validating -> Submitting -> Redirecting
//!   Idle -> Validating -> Submitting -> SubmitFailed -> Idle
//!
//! RULES:
//!   - All state lives on SurveySession; there are no globals.
//!   - Inputs arrive through dispatch(); each one is logged and
//!     progress is recomputed before dispatch() returns.
//!   - The submit button is disabled for the whole of Submitting, which
//!     is the only way a second attempt could start.
//!   - Every failure path leaves the button enabled with its normal label.

use crate::{
    assignment::{AssignmentLoader, ExperimentAssignment, LoadedAssignment, ParticipantIds},
    clock::{whole_seconds, SurveyClock},
    config::SurveyConfig,
    delivery::{DeliveryReport, DeliverySink, Transport},
    error::{SurveyError, SurveyResult},
    event::{FormInput, InteractionKind, InteractionLog},
    form::FormState,
    progress::{Progress, ProgressTracker},
    questionnaire::{QuestionKind, Questionnaire},
    record::{collect_answers, RecordInputs, SubmissionRecord},
    storage::{KeyValueStorage, SURVEY_COMPLETED_KEY},
    validation::{ValidationOutcome, Validator},
    visibility::{self, BlockToggle},
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPhase {
    Idle,
    Validating,
    Submitting,
    Redirecting,
    SubmitFailed,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubmitButton {
    pub enabled: bool,
    pub label:   String,
}

/// Result of the synchronous half of a submit.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitStep {
    /// Errors are shown; the session is back to Idle.
    Invalid(ValidationOutcome),
    /// The session is Submitting; deliver this record and call finish_submit().
    Ready(SubmissionRecord),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Invalid { validation: ValidationOutcome },
    Redirected { url: String, report: DeliveryReport },
    /// A blocking notice must be shown; the participant may retry.
    Failed { notice: String, report: DeliveryReport },
}

/// Snapshot of what the participant currently sees.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView<'a> {
    pub participant_id: Option<&'a str>,
    pub condition:      i64,
    pub group:          &'static str,
    pub resolved:       bool,
    pub phase:          SubmissionPhase,
    pub progress:       Progress,
    pub progress_pct:   f64,
    pub button:         &'a SubmitButton,
    pub errors:         &'a [String],
    pub scroll_to:      Option<&'a str>,
    pub blocks:         Vec<BlockToggle>,
    pub interactions:   usize,
}

pub struct SurveySession<C: SurveyClock> {
    config:          SurveyConfig,
    questionnaire:   Questionnaire,
    form:            FormState,
    loaded:          LoadedAssignment,
    interactions:    InteractionLog,
    progress:        Progress,
    button:          SubmitButton,
    phase:           SubmissionPhase,
    session_storage: Box<dyn KeyValueStorage>,
    clock:           C,
}

impl<C: SurveyClock> SurveySession<C> {
    /// Page load: resolve the assignment, apply visibility, compute the
    /// initial progress and log `survey_start`.
    pub fn start(
        config: SurveyConfig,
        questionnaire: Questionnaire,
        session_storage: Box<dyn KeyValueStorage>,
        query: &str,
        clock: C,
    ) -> Self {
        let now = clock.now_ms();
        let loaded = AssignmentLoader::load(session_storage.as_ref(), query, now);
        if !loaded.is_resolved() {
            log::warn!("experiment data not found or incomplete; data integrity is degraded");
        }

        let mut form = FormState::new(&questionnaire);
        visibility::resolve(
            &questionnaire,
            &mut form,
            loaded.condition(),
            config.conditional_visibility,
        );
        let progress = ProgressTracker::compute(&questionnaire, &form);

        let mut interactions = InteractionLog::new(now);
        interactions.record(InteractionKind::SurveyStart, "init", loaded.condition().code(), now);

        log::info!(
            "survey started: condition={} questions={} source={}",
            loaded.condition(),
            progress.total,
            loaded.source.label()
        );

        let button = SubmitButton { enabled: true, label: config.submit_label.clone() };
        Self {
            config,
            questionnaire,
            form,
            loaded,
            interactions,
            progress,
            button,
            phase: SubmissionPhase::Idle,
            session_storage,
            clock,
        }
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn config(&self) -> &SurveyConfig {
        &self.config
    }

    pub fn questionnaire(&self) -> &Questionnaire {
        &self.questionnaire
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn loaded(&self) -> &LoadedAssignment {
        &self.loaded
    }

    pub fn assignment(&self) -> &ExperimentAssignment {
        &self.loaded.assignment
    }

    pub fn interactions(&self) -> &InteractionLog {
        &self.interactions
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn button(&self) -> &SubmitButton {
        &self.button
    }

    pub fn phase(&self) -> SubmissionPhase {
        self.phase
    }

    pub fn session_storage(&self) -> &dyn KeyValueStorage {
        self.session_storage.as_ref()
    }

    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            participant_id: self.loaded.assignment.participant_id.as_deref(),
            condition:      self.loaded.condition().code(),
            group:          self.loaded.condition().group_name(),
            resolved:       self.loaded.is_resolved(),
            phase:          self.phase,
            progress:       self.progress,
            progress_pct:   self.progress.percent(),
            button:         &self.button,
            errors:         self.form.errors(),
            scroll_to:      self.form.scroll_target(),
            blocks:         self
                .form
                .block_states()
                .iter()
                .map(|(id, s)| BlockToggle { block_id: id.clone(), active: s.active })
                .collect(),
            interactions:   self.interactions.len(),
        }
    }

    // ── Inputs ─────────────────────────────────────────────────

    /// Apply one participant input, log it and recompute progress.
    pub fn dispatch(&mut self, input: FormInput) -> SurveyResult<Progress> {
        let now = self.clock.now_ms();
        let qn = &self.questionnaire;
        match &input {
            FormInput::Choose { question, value } => {
                self.form.choose(qn, question, value)?;
                self.interactions
                    .record(InteractionKind::Change, question, value.as_str(), now);
            }
            FormInput::Clear { question } => {
                self.form.clear(qn, question)?;
                self.interactions.record(InteractionKind::Change, question, "", now);
            }
            FormInput::AgeText { question, text } => {
                self.form.type_age(qn, question, text)?;
                self.interactions
                    .record(InteractionKind::Change, question, text.as_str(), now);
            }
            FormInput::AgeOptOut { question, checked } => {
                self.form.set_opt_out(qn, question, *checked)?;
                let (_, q) = qn.question(question)?;
                let control = match &q.kind {
                    QuestionKind::AgeComposite { opt_out_control } => opt_out_control.as_str(),
                    _ => question.as_str(),
                };
                let state = if *checked { "checked" } else { "unchecked" };
                self.interactions.record(InteractionKind::Change, control, state, now);
                if *checked {
                    self.interactions.record(InteractionKind::Checkbox, control, "checked", now);
                }
            }
        }
        self.progress = ProgressTracker::compute(&self.questionnaire, &self.form);
        Ok(self.progress)
    }

    /// Page is going away.
    pub fn unload(&mut self) {
        let now = self.clock.now_ms();
        let state = if self.phase == SubmissionPhase::Redirecting { "completed" } else { "incomplete" };
        self.interactions
            .record(InteractionKind::PageUnload, "survey", state, now);
        log::info!(
            "survey page unloading after {}s ({state})",
            whole_seconds(now - self.interactions.started_at())
        );
    }

    // ── Submit ─────────────────────────────────────────────────

    /// Validate and, if valid, enter Submitting with the record to send.
    pub fn begin_submit(&mut self) -> SurveyResult<SubmitStep> {
        match self.phase {
            SubmissionPhase::Submitting  => return Err(SurveyError::SubmissionInFlight),
            SubmissionPhase::Redirecting => return Err(SurveyError::AlreadySubmitted),
            _ => {}
        }
        if !self.button.enabled {
            return Err(SurveyError::SubmissionInFlight);
        }

        self.set_phase(SubmissionPhase::Validating);
        let validation = Validator::validate(&self.questionnaire, &mut self.form);
        if !validation.is_valid() {
            self.set_phase(SubmissionPhase::Idle);
            return Ok(SubmitStep::Invalid(validation));
        }

        self.set_phase(SubmissionPhase::Submitting);
        self.button = SubmitButton { enabled: false, label: self.config.submitting_label.clone() };

        match self.build_record() {
            Ok(record) => Ok(SubmitStep::Ready(record)),
            Err(e) => {
                log::error!("submission record could not be built: {e}");
                self.restore_idle();
                Err(e)
            }
        }
    }

    /// Complete the attempt started by begin_submit().
    pub fn finish_submit(&mut self, report: DeliveryReport) -> SurveyResult<SubmitOutcome> {
        if self.phase != SubmissionPhase::Submitting {
            return Err(SurveyError::NotSubmitting);
        }

        if report.delivered() {
            self.set_phase(SubmissionPhase::Redirecting);
            if let Err(e) = self.session_storage.set(SURVEY_COMPLETED_KEY, "true") {
                log::warn!("could not mark session completed: {e}");
            }
            let url = self.config.thank_you_url.clone();
            log::info!("submission dispatched, redirecting to {url}");
            return Ok(SubmitOutcome::Redirected { url, report });
        }

        self.set_phase(SubmissionPhase::SubmitFailed);
        log::warn!("submission failed: {}", report.detail);
        self.restore_idle();
        Ok(SubmitOutcome::Failed { notice: self.config.failure_notice.clone(), report })
    }

    /// The whole submit handler: validate, build, deliver, finish.
    pub fn submit<T: Transport, S: KeyValueStorage>(
        &mut self,
        sink: &mut DeliverySink<T, S>,
    ) -> SurveyResult<SubmitOutcome> {
        let record = match self.begin_submit()? {
            SubmitStep::Invalid(validation) => return Ok(SubmitOutcome::Invalid { validation }),
            SubmitStep::Ready(record) => record,
        };
        let report = sink.deliver(&record, self.clock.now_ms());
        self.finish_submit(report)
    }

    fn build_record(&self) -> SurveyResult<SubmissionRecord> {
        let answers = collect_answers(&self.questionnaire, &self.form);
        let ids = ParticipantIds::resolve(&self.loaded.assignment, self.session_storage.as_ref());
        SubmissionRecord::build(RecordInputs {
            questionnaire: &self.questionnaire,
            answers:       &answers,
            loaded:        &self.loaded,
            ids:           &ids,
            interactions:  &self.interactions,
            now:           self.clock.now_ms(),
        })
    }

    fn restore_idle(&mut self) {
        self.button = SubmitButton { enabled: true, label: self.config.submit_label.clone() };
        self.set_phase(SubmissionPhase::Idle);
    }

    fn set_phase(&mut self, phase: SubmissionPhase) {
        log::debug!("submission phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }
}
