//! survey-core: headless survey form controller.
//!
//! Loads the experiment assignment handed over by the shop page, keeps the
//! questionnaire's visibility and progress in sync with the participant's
//! answers, validates on submit, flattens everything into one record and
//! ships it to the spreadsheet endpoint (or keeps it locally when that fails).

pub mod assignment;
pub mod clock;
pub mod config;
pub mod delivery;
pub mod error;
pub mod event;
pub mod form;
pub mod progress;
pub mod questionnaire;
pub mod record;
pub mod session;
pub mod storage;
pub mod store;
pub mod types;
pub mod validation;
pub mod visibility;
