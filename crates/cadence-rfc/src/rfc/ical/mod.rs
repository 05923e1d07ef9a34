//! iCalendar recurrence (RFC 5545).
//!
//! - `core`: value types and recurring components
//! - `parse`: text to typed values
//! - `build`: typed values to text
//! - `expand`: occurrence and alarm evaluation
//!
//! ## Example
//!
//! ```rust
//! use cadence_rfc::rfc::ical::core::{Event, HasRecurrence};
//! use cadence_rfc::rfc::ical::expand::Window;
//! use cadence_rfc::rfc::ical::parse::{parse_datetime, parse_rrule};
//!
//! let mut event = Event::new(parse_datetime("20260105T090000", None)?);
//! event.recurrence_mut().add_rrule(parse_rrule("FREQ=WEEKLY;COUNT=3")?)?;
//!
//! let starts: Vec<String> = event
//!     .get_occurrences(&Window::unbounded())?
//!     .map(|occurrence| occurrence.map(|o| o.start().to_string()))
//!     .collect::<Result<_, _>>()?;
//! assert_eq!(starts, ["20260105T090000", "20260112T090000", "20260119T090000"]);
//! # Ok::<(), cadence_rfc::error::RfcError>(())
//! ```

pub mod build;
pub mod core;
pub mod expand;
pub mod parse;

pub use build::serialize_recurrence;
pub use parse::{ParseError, ParseResult, parse_rrule};
