//! Data collector & flattener tests.
//!
//! Tests cover: the output key mapping for a fixed, fully answered form,
//! N/A for hidden blocks, the age sentinel, cart and timing fields
//! (including half-up rounding of time on site).

use survey_core::{
    assignment::{AssignmentLoader, ParticipantIds},
    event::{InteractionKind, InteractionLog},
    form::FormState,
    questionnaire::Questionnaire,
    record::{collect_answers, RecordInputs, SubmissionRecord},
    storage::{MemoryStorage, EXPERIMENT_DATA_KEY},
    types::Condition,
    visibility::{resolve, VisibilityPolicy},
};

const STARTED: i64 = 1_700_000_000_000;

const SHOP_PAYLOAD: &str = r#"{
    "participantId": "P-7",
    "condition": 2,
    "timeOnSiteMs": 125400,
    "cart": {"A": 2, "B": 0, "C": 1},
    "cartTotal": 12.5,
    "events": [{"type": "add_to_cart", "productId": "A"}]
}"#;

/// Every always-on question plus the social-proof block, answered.
const ANSWERS: [(&str, &str); 16] = [
    ("q06_attraktiv", "5"),
    ("q07_hochwertig", "6"),
    ("q05_kaufwahrsch", "4"),
    ("q11_vorstellen", "3"),
    ("q08_relevant", "2"),
    ("q09_beschaeftigt", "7"),
    ("q10_interesse", "1"),
    ("qnew1_preis", "4"),
    ("qnew3_trust", "6"),
    ("q03_beliebt", "5"),
    ("q13_sp_check", "7"),
    ("q14_sc_check", "1"),
    ("q15_attention", "3"),
    ("q17_geschlecht", "divers"),
    ("q18_bildung", "master"),
    ("q19_protein", "woechentlich"),
];

fn build(age: Option<&str>, now: i64) -> SubmissionRecord {
    let qn = Questionnaire::standard();
    let session = MemoryStorage::new().with_entry(EXPERIMENT_DATA_KEY, SHOP_PAYLOAD);
    let loaded = AssignmentLoader::load(&session, "", STARTED);
    assert_eq!(loaded.condition(), Condition::SocialProof);

    let mut form = FormState::new(&qn);
    resolve(&qn, &mut form, loaded.condition(), VisibilityPolicy::Conditional);
    for (name, value) in ANSWERS {
        form.choose(&qn, name, value).unwrap();
    }
    match age {
        Some(text) => form.type_age(&qn, "q16_alter", text).unwrap(),
        None => form.set_opt_out(&qn, "q16_alter", true).unwrap(),
    }

    let mut log = InteractionLog::new(STARTED);
    log.record(InteractionKind::SurveyStart, "init", 2, STARTED);

    let answers = collect_answers(&qn, &form);
    let ids = ParticipantIds::resolve(&loaded.assignment, &session);
    SubmissionRecord::build(RecordInputs {
        questionnaire: &qn,
        answers:       &answers,
        loaded:        &loaded,
        ids:           &ids,
        interactions:  &log,
        now,
    })
    .expect("record builds")
}

#[test]
fn answers_are_renamed_to_output_keys() {
    let record = build(Some("29"), STARTED + 61_600);

    let expected = [
        ("q06_attractiveness", "5"),
        ("q07_quality", "6"),
        ("q05_purchaseIntention", "4"),
        ("q11_canImagine", "3"),
        ("q08_relevance", "2"),
        ("q09_involvement", "7"),
        ("q10_interest", "1"),
        ("qnew1_pricePerception", "4"),
        ("qnew3_trust", "6"),
        ("q03_popularity", "5"),
        ("q13_socialProofCheck", "7"),
        ("q14_scarcityCheck", "1"),
        ("q15_attentionCheck", "3"),
        ("q16_age", "29"),
        ("q17_gender", "divers"),
        ("q18_education", "master"),
        ("q19_proteinFrequency", "woechentlich"),
        // hidden for the social-proof group
        ("qnew2_urgency", "N/A"),
        ("q04_scarcity", "N/A"),
    ];
    for (key, value) in expected {
        assert_eq!(record.answer(key), Some(value), "field {key}");
    }
    assert_eq!(record.answers.len(), expected.len());
}

#[test]
fn metadata_fields_are_flattened() {
    let record = build(Some("29"), STARTED + 61_600);

    assert_eq!(record.participant_id, "P-7");
    assert_eq!(record.experiment_condition, Condition::SocialProof);
    assert_eq!(record.experiment_group_name, "socialproof");
    assert_eq!(record.assignment_source, "session");
    assert_eq!(record.cart_products, "A:2,C:1");
    assert_eq!(record.cart_total, "12.50");
    assert_eq!(record.time_on_site_seconds, 125);
    assert_eq!(record.survey_duration_seconds, 62);
    assert_eq!(record.prolific_pid, "N/A");
    assert_eq!(record.timestamp, "2023-11-14T22:14:21.600Z");
    assert_eq!(
        record.experiment_events,
        r#"[{"productId":"A","type":"add_to_cart"}]"#
    );
    assert!(record.interaction_events.contains(r#""type":"survey_start""#));
}

#[test]
fn opted_out_age_writes_the_sentinel() {
    let record = build(None, STARTED + 1_000);
    assert_eq!(record.answer("q16_age"), Some("Keine Angabe"));
}

#[test]
fn json_shape_uses_spreadsheet_column_names() {
    let record = build(Some("29"), STARTED + 1_000);
    let value: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();

    assert_eq!(value["experimentCondition"], 2);
    assert_eq!(value["cartProducts"], "A:2,C:1");
    assert_eq!(value["q06_attractiveness"], "5");
    assert_eq!(value["qnew2_urgency"], "N/A");
    assert!(value.get("prolificPID").is_some());
    assert!(value.get("surveyDurationSeconds").is_some());

    let back: SubmissionRecord = serde_json::from_value(value).unwrap();
    assert_eq!(back, record);
}

#[test]
fn empty_cart_reads_empty() {
    let qn = Questionnaire::standard();
    let loaded = AssignmentLoader::load(&MemoryStorage::new(), "?condition=1", STARTED);
    let form = FormState::new(&qn);
    let log = InteractionLog::new(STARTED);
    let answers = collect_answers(&qn, &form);
    let ids = ParticipantIds::resolve(&loaded.assignment, &MemoryStorage::new());
    let record = SubmissionRecord::build(RecordInputs {
        questionnaire: &qn,
        answers:       &answers,
        loaded:        &loaded,
        ids:           &ids,
        interactions:  &log,
        now:           STARTED,
    })
    .unwrap();

    assert_eq!(record.cart_products, "empty");
    assert_eq!(record.cart_total, "0.00");
    assert_eq!(record.assignment_source, "url");
    // unanswered radio groups are null, untouched selects are empty
    assert_eq!(record.answers["q06_attractiveness"], None);
    assert_eq!(record.answer("q17_gender"), Some(""));
}

#[test]
fn time_on_site_rounds_half_up_to_whole_seconds() {
    let qn = Questionnaire::standard();
    let form = FormState::new(&qn);
    let log = InteractionLog::new(STARTED);
    let answers = collect_answers(&qn, &form);
    let mut loaded = AssignmentLoader::load(&MemoryStorage::new(), "?condition=1", STARTED);
    let ids = ParticipantIds::resolve(&loaded.assignment, &MemoryStorage::new());

    for (ms, seconds) in [(1_499.6, 1), (1_500.0, 2), (125_400.0, 125)] {
        loaded.assignment.time_on_site_ms = ms;
        let record = SubmissionRecord::build(RecordInputs {
            questionnaire: &qn,
            answers:       &answers,
            loaded:        &loaded,
            ids:           &ids,
            interactions:  &log,
            now:           STARTED,
        })
        .unwrap();
        assert_eq!(record.time_on_site_seconds, seconds, "time on site {ms} ms");
    }
}
