//! Evaluation options and query windows.

use cadence_core::config::RecurrenceConfig;

use crate::rfc::ical::core::{DateTime, Validation};

/// Options for recurrence evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationOptions {
    /// How strictly rules are checked when attached.
    pub validation: Validation,

    /// Consecutive empty periods an unbounded rule may scan before
    /// evaluation fails.
    pub max_empty_periods: u32,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self::from(&RecurrenceConfig::default())
    }
}

impl From<&RecurrenceConfig> for EvaluationOptions {
    fn from(config: &RecurrenceConfig) -> Self {
        Self {
            validation: if config.strict_validation {
                Validation::Strict
            } else {
                Validation::Lenient
            },
            max_empty_periods: config.max_empty_periods.max(1),
        }
    }
}

impl EvaluationOptions {
    /// Sets the validation strictness.
    #[must_use]
    pub const fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    /// Sets the empty-period lookahead.
    #[must_use]
    pub const fn with_max_empty_periods(mut self, periods: u32) -> Self {
        self.max_empty_periods = periods;
        self
    }
}

/// Half-open evaluation window `[start, end)`.
///
/// Either bound may be open. Bound ordering is checked when the window is
/// used, since zoned bounds need a timezone resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Window {
    pub start: Option<DateTime>,
    pub end: Option<DateTime>,
}

impl Window {
    /// Creates a window from optional bounds.
    #[must_use]
    pub const fn new(start: Option<DateTime>, end: Option<DateTime>) -> Self {
        Self { start, end }
    }

    /// Window covering every occurrence.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Window `[start, end)`.
    #[must_use]
    pub const fn between(start: DateTime, end: DateTime) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Window from `start` onward.
    #[must_use]
    pub const fn starting(start: DateTime) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Window from the first occurrence up to `end`.
    #[must_use]
    pub const fn until(end: DateTime) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_recurrence_config() {
        let config = RecurrenceConfig {
            strict_validation: false,
            max_empty_periods: 25,
        };
        let options = EvaluationOptions::from(&config);
        assert_eq!(options.validation, Validation::Lenient);
        assert_eq!(options.max_empty_periods, 25);

        let defaults = EvaluationOptions::default();
        assert_eq!(defaults.validation, Validation::Strict);
        assert_eq!(defaults.max_empty_periods, 1000);
    }
}
