//! Timezone resolution for zoned iCalendar date-times.
//!
//! Uses ICU4X for Windows timezone ID to IANA mapping and timezone canonicalization.

use chrono::{LocalResult, NaiveDateTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use icu::time::zone::WindowsParser;
use icu::time::zone::iana::IanaParserExtended;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use crate::rfc::ical::core::{DateTime, DateTimeForm};

/// Error during timezone conversion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    /// Unknown or invalid timezone identifier.
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// Non-existent time during DST gap, even after shifting forward.
    #[error("Non-existent time (DST gap): {0}")]
    NonExistentTime(String),

    /// Invalid datetime.
    #[error("Invalid datetime: {0}")]
    InvalidDateTime(String),
}

/// Places zoned wall-clock readings on the UTC timeline.
///
/// Floating and UTC values never reach the resolver: floating values order
/// by their wall clock and UTC values by their UTC reading.
pub trait ResolveTimeZone: Send + Sync {
    /// ## Summary
    /// Converts a wall-clock reading in `tzid` to a UTC reading.
    ///
    /// ## Errors
    /// Returns a `ConversionError` if the timezone is unknown or the reading
    /// cannot be placed on the timeline.
    fn to_utc(&self, local: NaiveDateTime, tzid: &str) -> Result<NaiveDateTime, ConversionError>;

    /// ## Summary
    /// Returns the ordering instant of a value.
    ///
    /// ## Errors
    /// Propagates `to_utc` failures for zoned values.
    fn instant(&self, value: &DateTime) -> Result<NaiveDateTime, ConversionError> {
        match value.form() {
            DateTimeForm::Floating | DateTimeForm::Utc => Ok(value.local()),
            DateTimeForm::Zoned { tzid } => self.to_utc(value.local(), tzid),
        }
    }
}

/// IANA-backed resolver with a cache of resolved TZIDs.
pub struct TimeZoneResolver {
    cache: Mutex<HashMap<String, Tz>>,
}

impl TimeZoneResolver {
    /// Creates a new timezone resolver.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// ## Summary
    /// Resolves a timezone identifier to a `chrono_tz::Tz`.
    ///
    /// Common Windows and legacy TZIDs are mapped to their IANA equivalents.
    ///
    /// ## Errors
    ///
    /// Returns `ConversionError::UnknownTimezone` if the TZID cannot be resolved.
    ///
    /// ## Side Effects
    ///
    /// Caches successful resolutions to avoid repeated parsing.
    pub fn resolve(&self, tzid: &str) -> Result<Tz, ConversionError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tz) = cache.get(tzid) {
            return Ok(*tz);
        }

        let normalized = normalize_tzid(tzid);
        let tz = Tz::from_str(&normalized)
            .map_err(|_e| ConversionError::UnknownTimezone(tzid.to_string()))?;

        cache.insert(tzid.to_string(), tz);
        Ok(tz)
    }
}

impl Default for TimeZoneResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolveTimeZone for TimeZoneResolver {
    /// DST folds resolve to the earlier instant. Readings inside a DST gap are
    /// shifted forward by one hour.
    fn to_utc(&self, local: NaiveDateTime, tzid: &str) -> Result<NaiveDateTime, ConversionError> {
        let tz = self.resolve(tzid)?;

        match tz.from_local_datetime(&local) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Ok(dt.naive_utc()),
            LocalResult::None => {
                let shifted = local
                    .checked_add_signed(TimeDelta::hours(1))
                    .ok_or_else(|| ConversionError::InvalidDateTime(local.to_string()))?;
                tracing::debug!(%local, %shifted, tzid, "Shifting wall-clock time out of DST gap");
                match tz.from_local_datetime(&shifted) {
                    LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Ok(dt.naive_utc()),
                    LocalResult::None => Err(ConversionError::NonExistentTime(format!(
                        "{local} in timezone {tzid}"
                    ))),
                }
            }
        }
    }
}

/// Normalizes common Windows and legacy timezone identifiers to IANA names.
///
/// Uses ICU4X for Windows timezone ID mapping and IANA canonicalization.
fn normalize_tzid(tzid: &str) -> String {
    let stripped = tzid
        .strip_prefix("/mozilla.org/")
        .or_else(|| tzid.strip_prefix("/softwarestudio.org/"))
        .unwrap_or(tzid);

    let iana_parser = IanaParserExtended::new();

    if let Some(tz) = WindowsParser::new().parse(stripped, None) {
        for entry in iana_parser.iter() {
            if entry.time_zone == tz {
                return entry.canonical.to_string();
            }
        }
    }

    // Handles aliases like Europe/Kiev -> Europe/Kyiv
    let parsed = iana_parser.parse(stripped);
    if parsed.time_zone != icu::time::TimeZone::UNKNOWN {
        return parsed.canonical.to_string();
    }

    stripped.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn local(y: i32, m: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn test_resolve_standard_timezone() {
        let resolver = TimeZoneResolver::new();
        let tz = resolver.resolve("America/New_York").expect("should resolve");
        assert_eq!(tz, Tz::America__New_York);
    }

    #[test]
    fn test_resolve_unknown_timezone() {
        let resolver = TimeZoneResolver::new();
        let err = resolver.resolve("Mars/Olympus_Mons").unwrap_err();
        assert_eq!(err, ConversionError::UnknownTimezone("Mars/Olympus_Mons".into()));
    }

    #[test]
    fn test_normalize_windows_timezone() {
        assert_eq!(normalize_tzid("Eastern Standard Time"), "America/New_York");
        assert_eq!(normalize_tzid("W. Europe Standard Time"), "Europe/Berlin");
    }

    #[test]
    fn test_normalize_mozilla_prefix_and_alias() {
        assert_eq!(
            normalize_tzid("/mozilla.org/America/New_York"),
            "America/New_York"
        );
        assert_eq!(normalize_tzid("Europe/Kiev"), "Europe/Kyiv");
    }

    #[test]
    fn test_to_utc_standard_and_daylight() {
        let resolver = TimeZoneResolver::new();
        let winter = resolver
            .to_utc(local(2026, 1, 15, 10, 0), "America/New_York")
            .unwrap();
        assert_eq!(winter, local(2026, 1, 15, 15, 0));

        let summer = resolver
            .to_utc(local(2026, 7, 15, 10, 0), "America/New_York")
            .unwrap();
        assert_eq!(summer, local(2026, 7, 15, 14, 0));
    }

    #[test_log::test]
    fn test_to_utc_gap_shifts_forward() {
        let resolver = TimeZoneResolver::new();
        // 2026-03-08 02:30 does not exist in New York; 03:30 EDT is 07:30 UTC.
        let utc = resolver
            .to_utc(local(2026, 3, 8, 2, 30), "America/New_York")
            .unwrap();
        assert_eq!(utc, local(2026, 3, 8, 7, 30));
    }

    #[test]
    fn test_to_utc_fold_takes_earlier_instant() {
        let resolver = TimeZoneResolver::new();
        // 2026-11-01 01:30 happens twice in New York; the EDT reading is 05:30 UTC.
        let utc = resolver
            .to_utc(local(2026, 11, 1, 1, 30), "America/New_York")
            .unwrap();
        assert_eq!(utc, local(2026, 11, 1, 5, 30));
    }

    #[test]
    fn test_instant_ignores_resolver_for_floating_and_utc() {
        let resolver = TimeZoneResolver::new();
        let floating = DateTime::floating(2026, 1, 1, 9, 0, 0).unwrap();
        let utc = DateTime::utc(2026, 1, 1, 9, 0, 0).unwrap();
        assert_eq!(resolver.instant(&floating).unwrap(), local(2026, 1, 1, 9, 0));
        assert_eq!(resolver.instant(&utc).unwrap(), local(2026, 1, 1, 9, 0));

        let zoned = DateTime::zoned(2026, 1, 1, 9, 0, 0, "Europe/Berlin").unwrap();
        assert_eq!(resolver.instant(&zoned).unwrap(), local(2026, 1, 1, 8, 0));
    }
}
