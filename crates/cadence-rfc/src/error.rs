use thiserror::Error;

use crate::rfc::ical::expand::RecurrenceError;
use crate::rfc::ical::parse::ParseError;

/// Errors from reading and evaluating a recurrence definition
#[derive(Error, Debug)]
pub enum RfcError {
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    #[error("Recurrence error: {0}")]
    RecurrenceError(#[from] RecurrenceError),

    #[error(transparent)]
    CoreError(#[from] cadence_core::error::CoreError),
}

pub type RfcResult<T> = std::result::Result<T, RfcError>;
