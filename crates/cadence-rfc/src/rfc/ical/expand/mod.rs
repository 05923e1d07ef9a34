//! Recurrence expansion for iCalendar components.
//!
//! Expands DTSTART, RRULE, EXRULE, RDATE and EXDATE into the ordered
//! occurrence sequence of a component (RFC 5545 §3.8.5), caches what has
//! been evaluated, and derives alarm trigger times from the occurrences.

mod alarm;
mod cache;
mod error;
mod merge;
mod occurrence;
mod options;
mod recurrence;
mod rule;
mod timezone;

pub use alarm::{AlarmOccurrence, AlarmOccurrences};
pub use cache::OccurrenceCache;
pub use error::{RecurrenceError, RecurrenceResult};
pub use merge::{Candidate, OccurrenceKey, OccurrenceStream, fold_periods};
pub use occurrence::{Occurrence, Occurrences};
pub use options::{EvaluationOptions, Window};
pub use recurrence::{Candidates, Cursor, Recurrence};
pub use rule::RuleEvaluator;
pub use timezone::{ConversionError, ResolveTimeZone, TimeZoneResolver};
