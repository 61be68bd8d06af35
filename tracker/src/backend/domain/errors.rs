//! Typed failures raised by the domain layer before any store call is made.

use shared::{TimeOfDay, ValueError};

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter a valid amount in grams")]
    InvalidAmount,
    #[error("Not within a feeding window: entries are only accepted up to {tolerance_minutes} minutes before or after {anchors}")]
    OutsideSlotWindow {
        tolerance_minutes: u32,
        anchors: String,
    },
    #[error("{0} is not a configured feeding slot")]
    UnknownSlot(TimeOfDay),
    #[error("Slot {0} cannot be marked manually")]
    SlotNotMarkable(TimeOfDay),
    #[error("Please choose SHIT or PISS (got '{0}')")]
    InvalidToiletKind(String),
    #[error("Please choose a date")]
    MissingDate,
    #[error(transparent)]
    InvalidValue(#[from] ValueError),
    #[error("Please enter a diary text")]
    EmptyDiaryText,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Please select at least one kind of data")]
    NothingSelected,
    #[error("The start date must not be after the end date")]
    InvertedRange,
    #[error(transparent)]
    InvalidBound(ValueError),
}

impl From<ValueError> for ExportError {
    fn from(value: ValueError) -> Self {
        match value {
            ValueError::InvertedRange { .. } => ExportError::InvertedRange,
            other => ExportError::InvalidBound(other),
        }
    }
}
