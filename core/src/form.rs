//! In-memory form model — the pipeline's stand-in for the HTML document.
//!
//! Holds what the document would hold: current control values, which
//! blocks are shown and marked required, which error indicators are lit
//! and which control is disabled. Every write is checked against the
//! questionnaire so unknown controls and foreign option values never get in.

use crate::{
    error::{SurveyError, SurveyResult},
    questionnaire::{Question, QuestionKind, Questionnaire},
    types::{BlockId, ControlName},
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct BlockState {
    pub active:   bool,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct FormState {
    /// Checked radio value, selected option, or typed age text.
    values:    HashMap<ControlName, String>,
    /// Opt-out checkbox state, keyed by the age question's control name.
    opt_outs:  HashMap<ControlName, bool>,
    blocks:    BTreeMap<BlockId, BlockState>,
    disabled:  HashSet<ControlName>,
    /// Questions with a visible error indicator, in document order.
    errors:    Vec<ControlName>,
    scroll_to: Option<ControlName>,
}

impl FormState {
    /// Fresh document: ungated blocks shown and required, gated blocks
    /// hidden until the visibility resolver runs.
    pub fn new(questionnaire: &Questionnaire) -> Self {
        let blocks = questionnaire
            .blocks()
            .iter()
            .map(|b| {
                let active = !b.gate.is_gated();
                (b.id.clone(), BlockState { active, required: active })
            })
            .collect();
        Self {
            values:    HashMap::new(),
            opt_outs:  HashMap::new(),
            blocks,
            disabled:  HashSet::new(),
            errors:    Vec::new(),
            scroll_to: None,
        }
    }

    // ── Reads ─────────────────────────────────────────────────

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn opted_out(&self, name: &str) -> bool {
        self.opt_outs.get(name).copied().unwrap_or(false)
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.contains(name)
    }

    pub fn block_state(&self, id: &str) -> Option<BlockState> {
        self.blocks.get(id).copied()
    }

    pub fn block_states(&self) -> &BTreeMap<BlockId, BlockState> {
        &self.blocks
    }

    pub fn errors(&self) -> &[ControlName] {
        &self.errors
    }

    pub fn has_error(&self, name: &str) -> bool {
        self.errors.iter().any(|e| e == name)
    }

    pub fn scroll_target(&self) -> Option<&str> {
        self.scroll_to.as_deref()
    }

    /// Whether `question` currently holds an answer.
    pub fn is_answered(&self, question: &Question) -> bool {
        match &question.kind {
            QuestionKind::Radio { .. } | QuestionKind::Select { .. } => {
                self.value(&question.name).is_some_and(|v| !v.is_empty())
            }
            QuestionKind::AgeComposite { .. } => {
                let typed = self.value(&question.name).is_some_and(|v| !v.trim().is_empty());
                typed || self.opted_out(&question.name)
            }
        }
    }

    /// The "active & required" test shared by progress and validation.
    pub fn is_active_required(&self, block_id: &str, question: &Question) -> bool {
        question.required
            && self
                .block_state(block_id)
                .is_some_and(|s| s.active && s.required)
    }

    // ── Writes ────────────────────────────────────────────────

    /// Check a radio option or pick a select option.
    pub fn choose(&mut self, questionnaire: &Questionnaire, name: &str, value: &str) -> SurveyResult<()> {
        let question = self.editable(questionnaire, name)?;
        if matches!(question.kind, QuestionKind::AgeComposite { .. }) {
            return Err(SurveyError::InputMismatch { name: name.to_string() });
        }
        if !question.accepts_option(value) {
            return Err(SurveyError::UnknownOption {
                question: name.to_string(),
                value:    value.to_string(),
            });
        }
        self.values.insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Uncheck a radio group / reset a select / empty the age field.
    pub fn clear(&mut self, questionnaire: &Questionnaire, name: &str) -> SurveyResult<()> {
        self.editable(questionnaire, name)?;
        self.values.remove(name);
        Ok(())
    }

    /// Type into the age field. Non-empty text unchecks the opt-out.
    pub fn type_age(&mut self, questionnaire: &Questionnaire, name: &str, text: &str) -> SurveyResult<()> {
        let question = self.editable(questionnaire, name)?;
        if !matches!(question.kind, QuestionKind::AgeComposite { .. }) {
            return Err(SurveyError::InputMismatch { name: name.to_string() });
        }
        if self.is_disabled(name) {
            return Err(SurveyError::InputMismatch { name: name.to_string() });
        }
        if !text.is_empty() {
            self.opt_outs.insert(name.to_string(), false);
        }
        self.values.insert(name.to_string(), text.to_string());
        Ok(())
    }

    /// Toggle the age opt-out. Checking it empties and disables the text field.
    pub fn set_opt_out(&mut self, questionnaire: &Questionnaire, name: &str, checked: bool) -> SurveyResult<()> {
        let question = self.editable(questionnaire, name)?;
        if !matches!(question.kind, QuestionKind::AgeComposite { .. }) {
            return Err(SurveyError::InputMismatch { name: name.to_string() });
        }
        self.opt_outs.insert(name.to_string(), checked);
        if checked {
            self.values.insert(name.to_string(), String::new());
            self.disabled.insert(name.to_string());
        } else {
            self.disabled.remove(name);
        }
        Ok(())
    }

    pub(crate) fn set_block_state(&mut self, id: &str, state: BlockState) {
        self.blocks.insert(id.to_string(), state);
    }

    /// Drop every answer held by the controls of `block_id`.
    pub(crate) fn clear_block(&mut self, questionnaire: &Questionnaire, block_id: &str) {
        let Some(block) = questionnaire.block(block_id) else { return };
        for q in &block.questions {
            self.values.remove(&q.name);
            self.opt_outs.remove(&q.name);
            self.disabled.remove(&q.name);
            self.errors.retain(|e| e != &q.name);
        }
    }

    pub(crate) fn clear_errors(&mut self) {
        self.errors.clear();
        self.scroll_to = None;
    }

    pub(crate) fn show_error(&mut self, name: &str) {
        if !self.has_error(name) {
            self.errors.push(name.to_string());
        }
        if self.scroll_to.is_none() {
            self.scroll_to = Some(name.to_string());
        }
    }

    /// Resolve `name` and refuse controls the participant cannot see.
    fn editable<'q>(&self, questionnaire: &'q Questionnaire, name: &str) -> SurveyResult<&'q Question> {
        let (block, question) = questionnaire.question(name)?;
        let visible = self.block_state(&block.id).is_some_and(|s| s.active);
        if !visible {
            return Err(SurveyError::HiddenQuestion { name: name.to_string() });
        }
        Ok(question)
    }
}
