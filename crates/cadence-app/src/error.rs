use cadence_rfc::error::RfcError;
use cadence_rfc::rfc::ical::expand::RecurrenceError;
use cadence_rfc::rfc::ical::parse::ParseError;
use thiserror::Error;

/// Application-level errors (command line layer)
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    RfcError(#[from] RfcError),

    #[error(transparent)]
    CoreError(#[from] cadence_core::error::CoreError),

    #[error("Invalid argument --{argument}: {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: String,
    },
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        Self::RfcError(err.into())
    }
}

impl From<RecurrenceError> for AppError {
    fn from(err: RecurrenceError) -> Self {
        Self::RfcError(err.into())
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
