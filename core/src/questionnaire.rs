//! Declarative question block registry.
//!
//! Built once at start-up. Every control the pipeline reads or writes is
//! declared here together with its output key and the condition gate of
//! the block it lives in; nothing re-discovers structure at runtime.

use crate::{
    error::{SurveyError, SurveyResult},
    types::{BlockId, Condition, ControlName},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Written for the age question when the participant opts out.
pub const AGE_OPT_OUT_SENTINEL: &str = "Keine Angabe";

/// Written for questions of blocks that were never shown.
pub const NOT_APPLICABLE: &str = "N/A";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionKind {
    /// A radio group; counts as one question however many options it has.
    Radio { options: Vec<String> },
    Select { options: Vec<String> },
    /// Free-text age plus an opt-out checkbox. Answered if either is set.
    AgeComposite { opt_out_control: ControlName },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    pub name:       ControlName,
    pub output_key: String,
    #[serde(flatten)]
    pub kind:       QuestionKind,
    #[serde(default = "default_true")]
    pub required:   bool,
    /// Replaces a missing answer in the submission record.
    #[serde(default)]
    pub absent_sentinel: Option<String>,
}

impl Question {
    pub fn accepts_option(&self, value: &str) -> bool {
        match &self.kind {
            QuestionKind::Radio { options } | QuestionKind::Select { options } => {
                options.iter().any(|o| o == value)
            }
            QuestionKind::AgeComposite { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockGate {
    Always,
    Conditions(Vec<Condition>),
}

impl BlockGate {
    pub fn admits(&self, condition: Condition) -> bool {
        match self {
            Self::Always => true,
            Self::Conditions(set) => set.contains(&condition),
        }
    }

    pub fn is_gated(&self) -> bool {
        matches!(self, Self::Conditions(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionBlock {
    pub id:        BlockId,
    pub label:     String,
    pub gate:      BlockGate,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone)]
pub struct Questionnaire {
    blocks: Vec<QuestionBlock>,
    /// control name -> (block index, question index)
    index:  HashMap<ControlName, (usize, usize)>,
}

impl Questionnaire {
    pub fn new(blocks: Vec<QuestionBlock>) -> SurveyResult<Self> {
        let mut index = HashMap::new();
        let mut block_ids = std::collections::HashSet::new();
        for (bi, block) in blocks.iter().enumerate() {
            if !block_ids.insert(block.id.as_str()) {
                return Err(anyhow::anyhow!("Duplicate block id '{}'", block.id).into());
            }
            for (qi, q) in block.questions.iter().enumerate() {
                if index.insert(q.name.clone(), (bi, qi)).is_some() {
                    return Err(anyhow::anyhow!("Duplicate control name '{}'", q.name).into());
                }
                if let QuestionKind::Radio { options } | QuestionKind::Select { options } = &q.kind {
                    if options.is_empty() {
                        return Err(anyhow::anyhow!("Question '{}' has no options", q.name).into());
                    }
                }
            }
        }
        Ok(Self { blocks, index })
    }

    /// Parse a JSON array of blocks.
    pub fn from_json(json: &str) -> SurveyResult<Self> {
        let blocks: Vec<QuestionBlock> = serde_json::from_str(json)?;
        Self::new(blocks)
    }

    pub fn blocks(&self) -> &[QuestionBlock] {
        &self.blocks
    }

    pub fn block(&self, id: &str) -> Option<&QuestionBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Look up a question and the block that owns it.
    pub fn question(&self, name: &str) -> SurveyResult<(&QuestionBlock, &Question)> {
        let (bi, qi) = self
            .index
            .get(name)
            .copied()
            .ok_or_else(|| SurveyError::UnknownQuestion { name: name.to_string() })?;
        let block = &self.blocks[bi];
        Ok((block, &block.questions[qi]))
    }

    /// All questions in document order, paired with their block.
    pub fn questions(&self) -> impl Iterator<Item = (&QuestionBlock, &Question)> {
        self.blocks
            .iter()
            .flat_map(|b| b.questions.iter().map(move |q| (b, q)))
    }

    /// The product-evaluation questionnaire used by the shop experiment.
    pub fn standard() -> Self {
        use Condition::{Both, Scarcity, SocialProof};

        let blocks = vec![
            always("q06_block", "attractiveness", q("q06_attraktiv", "q06_attractiveness", likert())),
            always("q07_block", "quality", q("q07_hochwertig", "q07_quality", likert())),
            always("q05_block", "purchase intention", q("q05_kaufwahrsch", "q05_purchaseIntention", likert())),
            always("q11_block", "can imagine", q("q11_vorstellen", "q11_canImagine", likert())),
            always("q08_block", "relevance", q("q08_relevant", "q08_relevance", likert())),
            always("q09_block", "involvement", q("q09_beschaeftigt", "q09_involvement", likert())),
            always("q10_block", "interest", q("q10_interesse", "q10_interest", likert())),
            always("qnew1_block", "price perception", q("qnew1_preis", "qnew1_pricePerception", likert())),
            gated("qnew2_block", "urgency", &[Scarcity, Both], q("qnew2_urgency", "qnew2_urgency", likert())),
            gated("qnew3_block", "trust", &[SocialProof, Both], q("qnew3_trust", "qnew3_trust", likert())),
            gated("q03_block", "popularity", &[SocialProof, Both], q("q03_beliebt", "q03_popularity", likert())),
            gated("q04_block", "scarcity", &[Scarcity, Both], q("q04_knapp", "q04_scarcity", likert())),
            always("q13_block", "social proof check", q("q13_sp_check", "q13_socialProofCheck", likert())),
            always("q14_block", "scarcity check", q("q14_sc_check", "q14_scarcityCheck", likert())),
            always("q15_block", "attention check", q("q15_attention", "q15_attentionCheck", likert())),
            always(
                "q16_block",
                "age",
                q("q16_alter", "q16_age", QuestionKind::AgeComposite {
                    opt_out_control: "q16_keine_angabe".into(),
                }),
            ),
            always(
                "q17_block",
                "gender",
                q("q17_geschlecht", "q17_gender", select(&["weiblich", "maennlich", "divers", "keine_angabe"])),
            ),
            always(
                "q18_block",
                "education",
                q("q18_bildung", "q18_education", select(&[
                    "kein_abschluss", "hauptschule", "realschule", "abitur",
                    "ausbildung", "bachelor", "master", "promotion",
                ])),
            ),
            always(
                "q19_block",
                "protein frequency",
                q("q19_protein", "q19_proteinFrequency", select(&[
                    "nie", "seltener", "monatlich", "woechentlich", "mehrmals_woechentlich", "taeglich",
                ])),
            ),
        ];

        Self::new(blocks).expect("standard questionnaire is well-formed")
    }
}

fn likert() -> QuestionKind {
    QuestionKind::Radio { options: (1..=7).map(|n| n.to_string()).collect() }
}

fn select(options: &[&str]) -> QuestionKind {
    QuestionKind::Select { options: options.iter().map(|o| o.to_string()).collect() }
}

fn always(id: &str, label: &str, question: Question) -> QuestionBlock {
    QuestionBlock {
        id:        id.into(),
        label:     label.into(),
        gate:      BlockGate::Always,
        questions: vec![question],
    }
}

/// A block shown only for `conditions`; its answers read N/A otherwise.
fn gated(id: &str, label: &str, conditions: &[Condition], question: Question) -> QuestionBlock {
    QuestionBlock {
        id:        id.into(),
        label:     label.into(),
        gate:      BlockGate::Conditions(conditions.to_vec()),
        questions: vec![Question { absent_sentinel: Some(NOT_APPLICABLE.into()), ..question }],
    }
}

fn q(name: &str, output_key: &str, kind: QuestionKind) -> Question {
    Question {
        name: name.into(),
        output_key: output_key.into(),
        kind,
        required: true,
        absent_sentinel: None,
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_questionnaire_indexes_every_control() {
        let qn = Questionnaire::standard();
        assert_eq!(qn.questions().count(), 19);
        let (block, question) = qn.question("q04_knapp").unwrap();
        assert_eq!(block.id, "q04_block");
        assert_eq!(question.output_key, "q04_scarcity");
        assert_eq!(question.absent_sentinel.as_deref(), Some(NOT_APPLICABLE));
        assert!(qn.question("nope").is_err());
    }

    #[test]
    fn duplicate_control_names_are_rejected() {
        let block = |id: &str| QuestionBlock {
            id:        id.into(),
            label:     id.into(),
            gate:      BlockGate::Always,
            questions: vec![q("same", "same", QuestionKind::Radio { options: vec!["1".into()] })],
        };
        assert!(Questionnaire::new(vec![block("a"), block("b")]).is_err());
    }

    #[test]
    fn blocks_load_from_json() {
        let json = r#"[
            {"id": "q01_block", "label": "attractiveness", "gate": "always",
             "questions": [{"name": "q01_attraktiv", "output_key": "q01_attractiveness",
                            "kind": "radio", "options": ["1","2","3","4","5"]}]},
            {"id": "q02_block", "label": "scarcity", "gate": {"conditions": [3, 4]},
             "questions": [{"name": "q02_knapp", "output_key": "q02_scarcity",
                            "kind": "radio", "options": ["1","2"], "absent_sentinel": "N/A"}]}
        ]"#;
        let qn = Questionnaire::from_json(json).unwrap();
        let (block, question) = qn.question("q02_knapp").unwrap();
        assert!(block.gate.admits(Condition::Both));
        assert!(!block.gate.admits(Condition::SocialProof));
        assert!(question.required);
        assert!(question.accepts_option("2"));
        assert!(!question.accepts_option("7"));
    }
}
