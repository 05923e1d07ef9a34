//! Value type parsers for iCalendar (RFC 5545 §3.3).
//!
//! Only the value types a recurrence definition is made of: DATE, DATE-TIME,
//! DURATION, PERIOD and RECUR. Property and parameter tokenizing happens
//! before these functions are called; a TZID parameter is passed in.
#![expect(
    clippy::map_err_ignore,
    reason = "Numeric parse errors carry no detail beyond the token, which is recorded instead"
)]

use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};

use super::error::{ParseError, ParseErrorKind, ParseResult};
use crate::rfc::ical::core::{
    DateTime, DateTimeForm, Duration, Frequency, Period, PeriodList, RRule, Weekday, WeekdayNum,
};

/// Returns `s` if it is exactly `len` ASCII digits.
fn digits(s: &str, len: usize) -> Option<&str> {
    (s.len() == len && s.bytes().all(|b| b.is_ascii_digit())).then_some(s)
}

fn number<T: FromStr>(s: &str, kind: ParseErrorKind) -> ParseResult<T> {
    s.parse()
        .map_err(|_| ParseError::new(kind).with_token(s))
}

fn parse_naive_date(s: &str) -> ParseResult<NaiveDate> {
    let invalid = || ParseError::new(ParseErrorKind::InvalidDate).with_token(s);
    let s = digits(s, 8).ok_or_else(invalid)?;

    let year = number(&s[0..4], ParseErrorKind::InvalidDate)?;
    let month = number(&s[4..6], ParseErrorKind::InvalidDate)?;
    let day = number(&s[6..8], ParseErrorKind::InvalidDate)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Parses a TIME value. Returns the time and whether it carried a `Z` suffix.
fn parse_time(s: &str) -> ParseResult<(NaiveTime, bool)> {
    let invalid = || ParseError::new(ParseErrorKind::InvalidTime).with_token(s);
    let (time, is_utc) = match s.strip_suffix('Z') {
        Some(stripped) => (stripped, true),
        None => (s, false),
    };
    let time = digits(time, 6).ok_or_else(invalid)?;

    let hour = number(&time[0..2], ParseErrorKind::InvalidTime)?;
    let minute = number(&time[2..4], ParseErrorKind::InvalidTime)?;
    let second = number(&time[4..6], ParseErrorKind::InvalidTime)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(invalid)?;
    Ok((time, is_utc))
}

/// Parses a DATE value (RFC 5545 §3.3.4).
///
/// Format: YYYYMMDD (e.g., "19970714")
///
/// ## Errors
/// Returns `InvalidDate` if the string is not a valid calendar date.
pub fn parse_date(s: &str) -> ParseResult<DateTime> {
    parse_naive_date(s).map(DateTime::date)
}

/// Parses a DATE-TIME value (RFC 5545 §3.3.5).
///
/// Format: YYYYMMDD"T"HHMMSS[Z] (e.g., "19970714T133000Z")
///
/// A `Z` suffix wins over `tzid`; without either the value is floating.
///
/// ## Errors
/// Returns `InvalidDateTime`, `InvalidDate` or `InvalidTime` for malformed text.
pub fn parse_datetime(s: &str, tzid: Option<&str>) -> ParseResult<DateTime> {
    let (date, time) = s
        .split_once('T')
        .ok_or_else(|| ParseError::new(ParseErrorKind::InvalidDateTime).with_token(s))?;

    let date = parse_naive_date(date)?;
    let (time, is_utc) = parse_time(time)?;

    let form = if is_utc {
        DateTimeForm::Utc
    } else if let Some(tzid) = tzid {
        DateTimeForm::Zoned {
            tzid: tzid.to_string(),
        }
    } else {
        DateTimeForm::Floating
    };
    Ok(DateTime::new(date.and_time(time), form))
}

/// Parses a DATE or DATE-TIME value, whichever the text is.
///
/// ## Errors
/// Returns an error if the text is neither.
pub fn parse_date_or_datetime(s: &str, tzid: Option<&str>) -> ParseResult<DateTime> {
    if s.contains('T') {
        return parse_datetime(s, tzid);
    }
    let date = parse_date(s)?;
    Ok(match tzid {
        Some(tzid) => date.in_zone(tzid),
        None => date,
    })
}

/// Parses a DURATION value (RFC 5545 §3.3.6).
///
/// Format: [+|-]P[nW] or [+|-]P[nD][T[nH][nM][nS]]
///
/// ## Errors
/// Returns `InvalidDuration` if the string is not a valid duration.
pub fn parse_duration(s: &str) -> ParseResult<Duration> {
    let invalid = || ParseError::new(ParseErrorKind::InvalidDuration).with_token(s);

    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let rest = rest.strip_prefix('P').ok_or_else(invalid)?;

    let mut duration = if let Some(weeks) = rest.strip_suffix('W') {
        Duration::weeks(number(weeks, ParseErrorKind::InvalidDuration)?)
    } else {
        parse_duration_components(rest).ok_or_else(invalid)?
    };
    duration.negative = negative;
    Ok(duration)
}

/// Parses `[nD][T[nH][nM][nS]]`. Designators must appear in order and at
/// least one must be present.
fn parse_duration_components(s: &str) -> Option<Duration> {
    const DESIGNATORS: [char; 4] = ['D', 'H', 'M', 'S'];

    let mut duration = Duration::zero();
    let mut in_time = false;
    let mut next_designator = 0;
    let mut seen_any = false;
    let mut seen_in_time = false;
    let mut value: Option<u32> = None;

    for c in s.chars() {
        if let Some(digit) = c.to_digit(10) {
            value = Some(value.unwrap_or(0).checked_mul(10)?.checked_add(digit)?);
            continue;
        }
        if c == 'T' {
            if in_time || value.is_some() {
                return None;
            }
            in_time = true;
            next_designator = next_designator.max(1);
            continue;
        }

        let position = DESIGNATORS.iter().position(|&d| d == c)?;
        if position < next_designator || (position == 0) == in_time {
            return None;
        }
        let amount = value.take()?;
        match c {
            'D' => duration.days = amount,
            'H' => duration.hours = amount,
            'M' => duration.minutes = amount,
            _ => duration.seconds = amount,
        }
        next_designator = position + 1;
        seen_any = true;
        seen_in_time |= in_time;
    }

    let complete = value.is_none() && seen_any && (!in_time || seen_in_time);
    complete.then_some(duration)
}

/// Parses a PERIOD value (RFC 5545 §3.3.9).
///
/// Format: start"/"end or start"/"duration
///
/// A DATE start or end is accepted as well, so periods of all-day
/// occurrences read back as they are written.
///
/// ## Errors
/// Returns `InvalidPeriod` if there is no `/`, or the error of the start,
/// end or duration part.
pub fn parse_period(s: &str, tzid: Option<&str>) -> ParseResult<Period> {
    let (start, end) = s
        .split_once('/')
        .ok_or_else(|| ParseError::new(ParseErrorKind::InvalidPeriod).with_token(s))?;

    let start = parse_date_or_datetime(start, tzid)?;
    if end.starts_with(['P', '+', '-']) {
        Ok(Period::with_duration(start, parse_duration(end)?))
    } else {
        Ok(Period::with_end(start, parse_date_or_datetime(end, tzid)?))
    }
}

/// Parses the comma-separated value of an RDATE or EXDATE property. Each
/// entry is a DATE, a DATE-TIME or a PERIOD.
///
/// ## Errors
/// Returns `EmptyValue` for an empty list or entry, otherwise the error of
/// the first malformed entry.
pub fn parse_period_list(s: &str, tzid: Option<&str>) -> ParseResult<PeriodList> {
    s.split(',')
        .map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                Err(ParseError::new(ParseErrorKind::EmptyValue).with_token(s))
            } else if entry.contains('/') {
                parse_period(entry, tzid)
            } else {
                parse_date_or_datetime(entry, tzid).map(Period::instant)
            }
        })
        .collect()
}

/// Parses a RECUR value (RFC 5545 §3.3.10).
///
/// Rule parts may appear in any order and names are case-insensitive.
/// Unknown parts are skipped. Field ranges are checked later by
/// [`RRule::validate`], as is COUNT together with UNTIL.
///
/// ## Errors
/// Returns `MissingFrequency` without a FREQ part, and `InvalidRRule`,
/// `InvalidFrequency`, `InvalidWeekday` or `InvalidInteger` for a malformed
/// part. The error names the offending part and token.
pub fn parse_rrule(s: &str) -> ParseResult<RRule> {
    let parts = s
        .split(';')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            part.split_once('=')
                .map(|(key, value)| (key.trim().to_ascii_uppercase(), value.trim()))
                .ok_or_else(|| ParseError::new(ParseErrorKind::InvalidRRule).with_token(part))
        })
        .collect::<ParseResult<Vec<_>>>()?;

    let freq = parts
        .iter()
        .rev()
        .find(|(key, _)| key == "FREQ")
        .ok_or_else(|| ParseError::new(ParseErrorKind::MissingFrequency).with_token(s))?
        .1;
    let freq = Frequency::parse(freq).ok_or_else(|| {
        ParseError::new(ParseErrorKind::InvalidFrequency)
            .with_field("FREQ")
            .with_token(freq)
    })?;

    let mut rrule = RRule::new(freq);
    for (key, value) in &parts {
        parse_rrule_part(&mut rrule, key, value).map_err(|err| err.with_field(key.as_str()))?;
    }
    Ok(rrule)
}

/// Applies a single RRULE part.
fn parse_rrule_part(rrule: &mut RRule, key: &str, value: &str) -> ParseResult<()> {
    if value.is_empty() {
        return Err(ParseError::new(ParseErrorKind::EmptyValue));
    }
    match key {
        "FREQ" => {}
        "INTERVAL" => rrule.interval = number(value, ParseErrorKind::InvalidInteger)?,
        "COUNT" => rrule.count = Some(number(value, ParseErrorKind::InvalidInteger)?),
        "UNTIL" => rrule.until = Some(parse_date_or_datetime(value, None)?),
        "WKST" => rrule.wkst = Some(parse_weekday(value)?),
        "BYSECOND" => rrule.by_second = parse_list(value)?,
        "BYMINUTE" => rrule.by_minute = parse_list(value)?,
        "BYHOUR" => rrule.by_hour = parse_list(value)?,
        "BYDAY" => rrule.by_day = parse_byday(value)?,
        "BYMONTHDAY" => rrule.by_monthday = parse_list(value)?,
        "BYYEARDAY" => rrule.by_yearday = parse_list(value)?,
        "BYWEEKNO" => rrule.by_weekno = parse_list(value)?,
        "BYMONTH" => rrule.by_month = parse_list(value)?,
        "BYSETPOS" => rrule.by_setpos = parse_list(value)?,
        _ => tracing::debug!(part = %key, "Skipping unknown RRULE part"),
    }
    Ok(())
}

/// Parses a comma-separated list of integers.
fn parse_list<T: FromStr>(s: &str) -> ParseResult<Vec<T>> {
    s.split(',')
        .map(|v| number(v.trim(), ParseErrorKind::InvalidInteger))
        .collect()
}

fn parse_weekday(s: &str) -> ParseResult<Weekday> {
    Weekday::parse(s).ok_or_else(|| ParseError::new(ParseErrorKind::InvalidWeekday).with_token(s))
}

/// Parses a BYDAY value (weekdays with optional ordinals).
fn parse_byday(s: &str) -> ParseResult<Vec<WeekdayNum>> {
    s.split(',')
        .map(|v| parse_weekday_num(v.trim()))
        .collect()
}

/// Parses a single weekday with optional ordinal (e.g., "MO", "+1MO", "-1FR").
fn parse_weekday_num(s: &str) -> ParseResult<WeekdayNum> {
    let split = s
        .len()
        .checked_sub(2)
        .filter(|&at| s.is_char_boundary(at))
        .ok_or_else(|| ParseError::new(ParseErrorKind::InvalidWeekday).with_token(s))?;
    let (ordinal, weekday) = s.split_at(split);

    let weekday = parse_weekday(weekday).map_err(|err| err.with_token(s))?;
    let ordinal = if ordinal.is_empty() {
        None
    } else {
        Some(number(ordinal, ParseErrorKind::InvalidInteger).map_err(|err| err.with_token(s))?)
    };
    Ok(WeekdayNum { ordinal, weekday })
}

impl FromStr for RRule {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_rrule(s)
    }
}
