//! Occurrences of recurring components.

use std::fmt;

use super::error::RecurrenceResult;
use super::merge::Candidate;
use super::options::Window;
use super::recurrence::Cursor;
use crate::rfc::ical::core::{DateTime, Duration, HasRecurrence, Period, PeriodSpan};

/// One concrete instance of a recurring component.
///
/// Borrows the component it was produced from.
#[derive(Clone)]
pub struct Occurrence<'a> {
    pub period: Period,
    pub source: &'a dyn HasRecurrence,
}

impl<'a> Occurrence<'a> {
    /// Builds an occurrence from a merged start. An explicit RDATE span wins
    /// over the component's own duration.
    #[must_use]
    pub fn new(
        candidate: Candidate,
        duration: Option<Duration>,
        source: &'a dyn HasRecurrence,
    ) -> Self {
        let span = candidate
            .span
            .or_else(|| duration.map(PeriodSpan::Duration));
        Self {
            period: Period {
                start: candidate.start,
                span,
            },
            source,
        }
    }

    #[must_use]
    pub const fn start(&self) -> &DateTime {
        &self.period.start
    }

    /// End of the occurrence; equal to the start for instants.
    #[must_use]
    pub fn end(&self) -> DateTime {
        self.period
            .end()
            .unwrap_or_else(|| self.period.start.clone())
    }
}

impl PartialEq for Occurrence<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.period == other.period && self.source.uid() == other.source.uid()
    }
}

impl fmt::Debug for Occurrence<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Occurrence")
            .field("period", &self.period)
            .field("source", &self.source.uid())
            .finish()
    }
}

impl fmt::Display for Occurrence<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.period)
    }
}

/// Lazy, ascending occurrences of one component within a window.
pub struct Occurrences<'a> {
    source: &'a dyn HasRecurrence,
    duration: Option<Duration>,
    cursor: Cursor,
}

impl<'a> Occurrences<'a> {
    /// ## Summary
    /// Starts iterating the occurrences of `source` in `window`.
    ///
    /// ## Errors
    /// Returns `WindowOrder` if the window ends before it starts, or
    /// `Conversion` if a zoned bound cannot be resolved.
    pub fn new(source: &'a dyn HasRecurrence, window: &Window) -> RecurrenceResult<Self> {
        Ok(Self {
            source,
            duration: source.duration(),
            cursor: source.recurrence().cursor(window)?,
        })
    }
}

impl<'a> Iterator for Occurrences<'a> {
    type Item = RecurrenceResult<Occurrence<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let source = self.source;
        let candidate = source.recurrence().advance(&mut self.cursor)?;
        Some(candidate.map(|candidate| Occurrence::new(candidate, self.duration, source)))
    }
}

impl fmt::Debug for Occurrences<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Occurrences")
            .field("source", &self.source.uid())
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}
