//! iCalendar value parsing error types.

use std::fmt;

/// Result type for value parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Error type for value parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Kind of error.
    pub kind: ParseErrorKind,
    /// Rule part or property the malformed text belongs to (`BYMONTH`, `RDATE`).
    pub field: Option<String>,
    /// The offending token.
    pub token: Option<String>,
}

impl ParseError {
    /// Creates a new parse error.
    #[must_use]
    pub const fn new(kind: ParseErrorKind) -> Self {
        Self {
            kind,
            field: None,
            token: None,
        }
    }

    /// Records the field the error was found in. An inner field is kept.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        if self.field.is_none() {
            self.field = Some(field.into());
        }
        self
    }

    /// Records the offending token. An inner token is kept.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        if self.token.is_none() {
            self.token = Some(token.into());
        }
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ref field) = self.field {
            write!(f, " in {field}")?;
        }
        if let Some(ref token) = self.token {
            write!(f, ": {token:?}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Kinds of parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Invalid date format.
    InvalidDate,
    /// Invalid time format.
    InvalidTime,
    /// Invalid date-time format.
    InvalidDateTime,
    /// Invalid duration format.
    InvalidDuration,
    /// Invalid period format.
    InvalidPeriod,
    /// Invalid recurrence rule.
    InvalidRRule,
    /// Invalid frequency.
    InvalidFrequency,
    /// Invalid weekday.
    InvalidWeekday,
    /// Invalid integer value.
    InvalidInteger,
    /// Recurrence rule without FREQ.
    MissingFrequency,
    /// Empty value where one is required.
    EmptyValue,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDate => write!(f, "invalid date format"),
            Self::InvalidTime => write!(f, "invalid time format"),
            Self::InvalidDateTime => write!(f, "invalid date-time format"),
            Self::InvalidDuration => write!(f, "invalid duration format"),
            Self::InvalidPeriod => write!(f, "invalid period format"),
            Self::InvalidRRule => write!(f, "invalid recurrence rule"),
            Self::InvalidFrequency => write!(f, "invalid frequency"),
            Self::InvalidWeekday => write!(f, "invalid weekday"),
            Self::InvalidInteger => write!(f, "invalid integer value"),
            Self::MissingFrequency => write!(f, "recurrence rule has no FREQ"),
            Self::EmptyValue => write!(f, "empty value"),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
