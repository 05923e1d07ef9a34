//! Recurrence evaluation errors.

use super::timezone::ConversionError;

/// Result type for recurrence evaluation.
pub type RecurrenceResult<T> = Result<T, RecurrenceError>;

/// Error raised while validating or evaluating a recurrence definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecurrenceError {
    /// Malformed rule: zero interval, out-of-range BY-value, or COUNT with
    /// UNTIL under strict validation.
    #[error("Invalid recurrence ({field}): {reason}")]
    InvalidRecurrence { field: &'static str, reason: String },

    /// An unbounded rule scanned the configured number of periods without
    /// producing a candidate and no window end was available.
    #[error("Rule {rule} produced no occurrences in {periods} consecutive periods")]
    EvaluationSafetyLimitExceeded { rule: String, periods: u32 },

    /// Window end precedes window start.
    #[error("Window end {end} precedes window start {start}")]
    WindowOrder { start: String, end: String },

    /// A zoned value could not be placed on the timeline.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl RecurrenceError {
    /// Creates an `InvalidRecurrence` error for a rule part.
    #[must_use]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRecurrence {
            field,
            reason: reason.into(),
        }
    }
}
