//! Validator — runs on submit and lights an error on every active
//! required question that still has no answer.

use crate::{form::FormState, questionnaire::Questionnaire, types::ControlName};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Unanswered questions in document order.
    pub missing:     Vec<ControlName>,
    /// The indicator scrolled into view.
    pub first_error: Option<ControlName>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
    }
}

pub struct Validator;

impl Validator {
    /// Clears old indicators, then flags the current gaps. Answers are
    /// never touched.
    pub fn validate(questionnaire: &Questionnaire, form: &mut FormState) -> ValidationOutcome {
        form.clear_errors();

        let mut outcome = ValidationOutcome::default();
        for (block, question) in questionnaire.questions() {
            if !form.is_active_required(&block.id, question) {
                continue;
            }
            if form.is_answered(question) {
                continue;
            }
            log::debug!("validation: {} unanswered", question.name);
            form.show_error(&question.name);
            outcome.missing.push(question.name.clone());
        }
        outcome.first_error = form.scroll_target().map(str::to_string);

        if outcome.is_valid() {
            log::info!("validation passed");
        } else {
            log::info!("validation failed: {} unanswered", outcome.missing.len());
        }
        outcome
    }
}
