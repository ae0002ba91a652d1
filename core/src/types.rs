//! Shared primitive types used across the entire survey pipeline.

use crate::error::SurveyError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds since the Unix epoch. The upstream page writes all of its
/// timestamps in this unit.
pub type UnixMillis = i64;

/// Name of a form control (the `name` attribute in the original document).
pub type ControlName = String;

/// Identifier of a question block.
pub type BlockId = String;

/// Experimental treatment a participant was assigned to.
/// Serialized as its integer code; any other integer is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Condition {
    Control     = 1,
    SocialProof = 2,
    Scarcity    = 3,
    Both        = 4,
}

impl Condition {
    pub const ALL: [Condition; 4] = [
        Condition::Control,
        Condition::SocialProof,
        Condition::Scarcity,
        Condition::Both,
    ];

    pub fn code(self) -> i64 {
        self as i64
    }

    /// Group name written to the spreadsheet.
    pub fn group_name(self) -> &'static str {
        match self {
            Self::Control     => "control",
            Self::SocialProof => "socialproof",
            Self::Scarcity    => "scarcity",
            Self::Both        => "both",
        }
    }
}

impl TryFrom<i64> for Condition {
    type Error = SurveyError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Control),
            2 => Ok(Self::SocialProof),
            3 => Ok(Self::Scarcity),
            4 => Ok(Self::Both),
            _ => Err(SurveyError::InvalidCondition { value: value.to_string() }),
        }
    }
}

impl From<Condition> for i64 {
    fn from(c: Condition) -> Self {
        c.code()
    }
}

impl std::str::FromStr for Condition {
    type Err = SurveyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code: i64 = s
            .trim()
            .parse()
            .map_err(|_| SurveyError::InvalidCondition { value: s.to_string() })?;
        Self::try_from(code)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.group_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_maps_to_exactly_one_group() {
        let names: Vec<_> = Condition::ALL.iter().map(|c| c.group_name()).collect();
        assert_eq!(names, ["control", "socialproof", "scarcity", "both"]);
        for c in Condition::ALL {
            assert_eq!(Condition::try_from(c.code()).unwrap(), c);
        }
    }

    #[test]
    fn out_of_range_codes_are_rejected() {
        assert!(Condition::try_from(0).is_err());
        assert!(Condition::try_from(5).is_err());
        assert!("abc".parse::<Condition>().is_err());
        assert_eq!(" 3 ".parse::<Condition>().unwrap(), Condition::Scarcity);
    }

    #[test]
    fn serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Condition::Both).unwrap(), "4");
        let c: Condition = serde_json::from_str("2").unwrap();
        assert_eq!(c, Condition::SocialProof);
        assert!(serde_json::from_str::<Condition>("9").is_err());
    }
}
