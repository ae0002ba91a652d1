//! Validator tests.
//!
//! Tests cover: rejection iff a visible required question is open, error
//! indicators being reset between runs, the age composite rule, and
//! answers surviving validation untouched.

use survey_core::{
    form::FormState,
    questionnaire::{QuestionKind, Questionnaire},
    types::Condition,
    validation::Validator,
    visibility::{resolve, VisibilityPolicy},
};

fn filled_form(qn: &Questionnaire, condition: Condition) -> FormState {
    let mut form = FormState::new(qn);
    resolve(qn, &mut form, condition, VisibilityPolicy::Conditional);
    let visible: Vec<_> = qn
        .questions()
        .filter(|(b, q)| form.is_active_required(&b.id, q))
        .map(|(_, q)| q.clone())
        .collect();
    for q in visible {
        match &q.kind {
            QuestionKind::Radio { options } | QuestionKind::Select { options } => {
                form.choose(qn, &q.name, options.last().unwrap()).unwrap()
            }
            QuestionKind::AgeComposite { .. } => form.type_age(qn, &q.name, "29").unwrap(),
        }
    }
    form
}

#[test]
fn complete_form_passes() {
    let qn = Questionnaire::standard();
    for condition in Condition::ALL {
        let mut form = filled_form(&qn, condition);
        let outcome = Validator::validate(&qn, &mut form);
        assert!(outcome.is_valid(), "condition {condition}: {:?}", outcome.missing);
        assert!(form.errors().is_empty());
        assert_eq!(outcome.first_error, None);
    }
}

#[test]
fn open_questions_are_flagged_in_document_order() {
    let qn = Questionnaire::standard();
    let mut form = filled_form(&qn, Condition::Both);
    form.clear(&qn, "q18_bildung").unwrap();
    form.clear(&qn, "q04_knapp").unwrap();

    let outcome = Validator::validate(&qn, &mut form);

    assert!(!outcome.is_valid());
    assert_eq!(outcome.missing, ["q04_knapp", "q18_bildung"]);
    assert_eq!(outcome.first_error.as_deref(), Some("q04_knapp"));
    assert!(form.has_error("q04_knapp"));
    assert_eq!(form.scroll_target(), Some("q04_knapp"));
}

#[test]
fn correcting_flagged_fields_then_revalidating_passes() {
    let qn = Questionnaire::standard();
    let mut form = filled_form(&qn, Condition::Scarcity);
    form.clear(&qn, "qnew2_urgency").unwrap();
    assert!(!Validator::validate(&qn, &mut form).is_valid());
    assert_eq!(form.errors(), ["qnew2_urgency"]);

    form.choose(&qn, "qnew2_urgency", "4").unwrap();
    let outcome = Validator::validate(&qn, &mut form);
    assert!(outcome.is_valid());
    assert!(form.errors().is_empty(), "stale indicators must be cleared");
}

#[test]
fn hidden_blocks_never_block_submission() {
    let qn = Questionnaire::standard();
    let mut form = filled_form(&qn, Condition::Control);
    assert_eq!(form.value("q04_knapp"), None);
    assert!(Validator::validate(&qn, &mut form).is_valid());
}

#[test]
fn age_composite_rule() {
    let qn = Questionnaire::standard();

    let mut form = filled_form(&qn, Condition::Control);
    form.clear(&qn, "q16_alter").unwrap();
    let outcome = Validator::validate(&qn, &mut form);
    assert_eq!(outcome.missing, ["q16_alter"]);

    form.set_opt_out(&qn, "q16_alter", true).unwrap();
    assert!(Validator::validate(&qn, &mut form).is_valid());

    form.set_opt_out(&qn, "q16_alter", false).unwrap();
    form.type_age(&qn, "q16_alter", "29").unwrap();
    assert!(Validator::validate(&qn, &mut form).is_valid());
}

#[test]
fn validation_does_not_touch_answers() {
    let qn = Questionnaire::standard();
    let mut form = filled_form(&qn, Condition::Both);
    form.clear(&qn, "q06_attraktiv").unwrap();
    let before: Vec<_> = qn.questions().map(|(_, q)| form.value(&q.name).map(str::to_string)).collect();

    Validator::validate(&qn, &mut form);

    let after: Vec<_> = qn.questions().map(|(_, q)| form.value(&q.name).map(str::to_string)).collect();
    assert_eq!(before, after);
}
