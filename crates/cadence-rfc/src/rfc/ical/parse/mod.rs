//! iCalendar value parsing (RFC 5545 §3.3).
//!
//! Turns the raw text of DTSTART, RRULE, EXRULE, RDATE and EXDATE values into
//! typed values. Errors name the offending rule part and token.

mod error;
mod values;

pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use values::{
    parse_date, parse_date_or_datetime, parse_datetime, parse_duration, parse_period,
    parse_period_list, parse_rrule,
};
