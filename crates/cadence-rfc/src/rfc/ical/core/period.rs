//! iCalendar PERIOD values and RDATE/EXDATE lists (RFC 5545 §3.3.9, §3.8.5).

use std::fmt;

use super::{DateTime, Duration};

/// How a period's extent is written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeriodSpan {
    /// Explicit end: `start/end`.
    End(DateTime),
    /// Start plus duration: `start/duration`.
    Duration(Duration),
}

/// A single RDATE/EXDATE entry.
///
/// A period without a span is an instant; one with a span is a single
/// occurrence covering that span.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Period {
    /// Start of the period.
    pub start: DateTime,
    /// Optional extent of the period.
    pub span: Option<PeriodSpan>,
}

impl Period {
    /// Creates an instant period.
    #[must_use]
    pub const fn instant(start: DateTime) -> Self {
        Self { start, span: None }
    }

    /// Creates a period with an explicit end.
    #[must_use]
    pub const fn with_end(start: DateTime, end: DateTime) -> Self {
        Self {
            start,
            span: Some(PeriodSpan::End(end)),
        }
    }

    /// Creates a period with a duration.
    #[must_use]
    pub const fn with_duration(start: DateTime, duration: Duration) -> Self {
        Self {
            start,
            span: Some(PeriodSpan::Duration(duration)),
        }
    }

    /// Returns whether the period is a bare instant.
    #[must_use]
    pub const fn is_instant(&self) -> bool {
        self.span.is_none()
    }

    /// Returns the end of the period, if it has a span.
    ///
    /// A duration span is applied to the start's wall clock.
    #[must_use]
    pub fn end(&self) -> Option<DateTime> {
        match &self.span {
            Some(PeriodSpan::End(end)) => Some(end.clone()),
            Some(PeriodSpan::Duration(duration)) => self.start.checked_add(duration),
            None => None,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start)?;
        match &self.span {
            Some(PeriodSpan::End(end)) => write!(f, "/{end}"),
            Some(PeriodSpan::Duration(duration)) => write!(f, "/{duration}"),
            None => Ok(()),
        }
    }
}

/// Ordered list of periods from one or more RDATE or EXDATE properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodList {
    periods: Vec<Period>,
}

impl PeriodList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            periods: Vec::new(),
        }
    }

    /// Appends a period.
    pub fn push(&mut self, period: Period) {
        self.periods.push(period);
    }

    /// Appends every period of another list.
    pub fn extend(&mut self, other: Self) {
        self.periods.extend(other.periods);
    }

    /// Removes every period.
    pub fn clear(&mut self) {
        self.periods.clear();
    }

    /// Returns the number of periods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    /// Returns whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Iterates the periods in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Period> {
        self.periods.iter()
    }

    /// Returns the periods as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Period] {
        &self.periods
    }
}

impl From<Vec<Period>> for PeriodList {
    fn from(periods: Vec<Period>) -> Self {
        Self { periods }
    }
}

impl FromIterator<Period> for PeriodList {
    fn from_iter<I: IntoIterator<Item = Period>>(iter: I) -> Self {
        Self {
            periods: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PeriodList {
    type Item = &'a Period;
    type IntoIter = std::slice::Iter<'a, Period>;

    fn into_iter(self) -> Self::IntoIter {
        self.periods.iter()
    }
}

impl fmt::Display for PeriodList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, period) in self.periods.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{period}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_display_forms() {
        let start = DateTime::utc(2026, 1, 5, 9, 0, 0).unwrap();
        let end = DateTime::utc(2026, 1, 5, 10, 30, 0).unwrap();

        assert_eq!(Period::instant(start.clone()).to_string(), "20260105T090000Z");
        assert_eq!(
            Period::with_end(start.clone(), end).to_string(),
            "20260105T090000Z/20260105T103000Z"
        );
        assert_eq!(
            Period::with_duration(start, Duration::hours(2)).to_string(),
            "20260105T090000Z/PT2H"
        );
    }

    #[test]
    fn period_end_from_duration() {
        let start = DateTime::floating(2026, 1, 5, 23, 0, 0).unwrap();
        let period = Period::with_duration(start, Duration::hours(2));
        assert_eq!(period.end().unwrap().to_string(), "20260106T010000");
        assert!(Period::instant(DateTime::from_ymd(2026, 1, 5).unwrap()).end().is_none());
    }

    #[test]
    fn period_list_keeps_declaration_order() {
        let list: PeriodList = [
            Period::instant(DateTime::from_ymd(2026, 3, 1).unwrap()),
            Period::instant(DateTime::from_ymd(2026, 1, 1).unwrap()),
        ]
        .into_iter()
        .collect();

        assert_eq!(list.len(), 2);
        assert_eq!(list.to_string(), "20260301,20260101");
    }
}
