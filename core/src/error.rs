use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurveyError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid condition '{value}': expected an integer 1..=4")]
    InvalidCondition { value: String },

    #[error("Question '{name}' not found")]
    UnknownQuestion { name: String },

    #[error("Value '{value}' is not an option of question '{question}'")]
    UnknownOption { question: String, value: String },

    #[error("Question '{name}' is hidden and cannot be answered")]
    HiddenQuestion { name: String },

    #[error("Question '{name}' does not accept this kind of input")]
    InputMismatch { name: String },

    #[error("A submission is already in flight")]
    SubmissionInFlight,

    #[error("The survey has already been submitted")]
    AlreadySubmitted,

    #[error("No submission is in flight")]
    NotSubmitting,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SurveyResult<T> = Result<T, SurveyError>;
