//! Visibility resolver — shows the condition-gated blocks for this
//! participant and hides the rest.
//!
//! A block's required marking always equals its visibility. Hiding a block
//! also wipes whatever was entered in it so stale answers can neither leak
//! into the record nor block validation.

use crate::{
    form::{BlockState, FormState},
    questionnaire::Questionnaire,
    types::{BlockId, Condition},
};
use serde::{Deserialize, Serialize};

/// Whether condition gates are honoured at all.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum VisibilityPolicy {
    /// Gated blocks follow the truth table.
    #[default]
    #[serde(rename = "enabled")]
    Conditional,
    /// Every block is shown and required regardless of condition.
    #[serde(rename = "disabled")]
    Unconditional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockToggle {
    pub block_id: BlockId,
    pub active:   bool,
}

/// Apply the truth table for `condition`. Idempotent.
pub fn resolve(
    questionnaire: &Questionnaire,
    form: &mut FormState,
    condition: Condition,
    policy: VisibilityPolicy,
) -> Vec<BlockToggle> {
    let mut toggles = Vec::with_capacity(questionnaire.blocks().len());
    for block in questionnaire.blocks() {
        let active = match policy {
            VisibilityPolicy::Unconditional => true,
            VisibilityPolicy::Conditional   => block.gate.admits(condition),
        };
        if !active {
            form.clear_block(questionnaire, &block.id);
        }
        form.set_block_state(&block.id, BlockState { active, required: active });

        if block.gate.is_gated() {
            log::debug!(
                "block {} ({}) {} for condition {condition}",
                block.id,
                block.label,
                if active { "shown" } else { "hidden" }
            );
        }
        toggles.push(BlockToggle { block_id: block.id.clone(), active });
    }
    toggles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_from_config_words() {
        let p: VisibilityPolicy = serde_json::from_str("\"disabled\"").unwrap();
        assert_eq!(p, VisibilityPolicy::Unconditional);
        assert_eq!(VisibilityPolicy::default(), VisibilityPolicy::Conditional);
    }
}
