//! Progress tracker — how many active required questions are answered.

use crate::{form::FormState, questionnaire::Questionnaire};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct Progress {
    pub answered: usize,
    pub total:    usize,
}

impl Progress {
    /// Completion in [0, 1]. A form with nothing required is complete.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.answered as f64 / self.total as f64
    }

    /// Width of the progress indicator, 0–100.
    pub fn percent(&self) -> f64 {
        self.ratio() * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.answered == self.total
    }
}

pub struct ProgressTracker;

impl ProgressTracker {
    pub fn compute(questionnaire: &Questionnaire, form: &FormState) -> Progress {
        let mut progress = Progress::default();
        for (block, question) in questionnaire.questions() {
            if !form.is_active_required(&block.id, question) {
                continue;
            }
            progress.total += 1;
            if form.is_answered(question) {
                progress.answered += 1;
            }
        }
        log::debug!(
            "progress: {}/{} ({:.0}%)",
            progress.answered,
            progress.total,
            progress.percent()
        );
        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_is_bounded() {
        assert_eq!(Progress { answered: 0, total: 0 }.ratio(), 1.0);
        assert_eq!(Progress { answered: 0, total: 4 }.ratio(), 0.0);
        assert_eq!(Progress { answered: 2, total: 4 }.percent(), 50.0);
        assert!(Progress { answered: 4, total: 4 }.is_complete());
    }
}
