//! iCalendar DATE and DATE-TIME values (RFC 5545 §3.3.4, §3.3.5).

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use super::Duration;

/// Form of DATE-TIME value (RFC 5545 §3.3.5).
///
/// iCalendar DATE-TIME values come in three mutually exclusive forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DateTimeForm {
    /// Floating time - same wall-clock time in any timezone.
    ///
    /// Example: `19980118T230000`
    Floating,

    /// UTC time - absolute instant, indicated by 'Z' suffix.
    ///
    /// Example: `19980119T070000Z`
    Utc,

    /// Zoned time - local time with TZID reference.
    ///
    /// Example: `TZID=America/New_York:19980119T020000`
    Zoned {
        /// The timezone identifier as written in the TZID parameter.
        tzid: String,
    },
}

/// A DATE or DATE-TIME value.
///
/// The wall-clock reading is kept as a [`NaiveDateTime`]; for the
/// [`DateTimeForm::Utc`] form it is the UTC reading. Date-only values always
/// carry a midnight time and the floating form unless a TZID was supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DateTime {
    local: NaiveDateTime,
    form: DateTimeForm,
    date_only: bool,
}

impl DateTime {
    /// Creates a DATE-TIME from a wall-clock reading and a form.
    #[must_use]
    pub const fn new(local: NaiveDateTime, form: DateTimeForm) -> Self {
        Self {
            local,
            form,
            date_only: false,
        }
    }

    /// Creates a floating DATE value.
    #[must_use]
    pub fn date(date: NaiveDate) -> Self {
        Self {
            local: date.and_time(NaiveTime::MIN),
            form: DateTimeForm::Floating,
            date_only: true,
        }
    }

    /// Creates a floating DATE value from its components.
    #[must_use]
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self::date)
    }

    /// Creates a floating DATE-TIME.
    #[must_use]
    pub fn floating(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Option<Self> {
        naive(year, month, day, hour, minute, second).map(|local| Self::new(local, DateTimeForm::Floating))
    }

    /// Creates a UTC DATE-TIME.
    #[must_use]
    pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Option<Self> {
        naive(year, month, day, hour, minute, second).map(|local| Self::new(local, DateTimeForm::Utc))
    }

    /// Creates a zoned DATE-TIME.
    #[must_use]
    #[expect(
        clippy::too_many_arguments,
        reason = "Constructor mirrors RFC 5545 DATE-TIME components plus TZID"
    )]
    pub fn zoned(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        tzid: impl Into<String>,
    ) -> Option<Self> {
        let tzid = tzid.into();
        naive(year, month, day, hour, minute, second)
            .map(|local| Self::new(local, DateTimeForm::Zoned { tzid }))
    }

    /// Attaches a TZID to this value, turning it into a zoned value.
    ///
    /// UTC values are left untouched: a 'Z' suffix always wins over TZID.
    #[must_use]
    pub fn in_zone(mut self, tzid: impl Into<String>) -> Self {
        if !self.is_utc() {
            self.form = DateTimeForm::Zoned { tzid: tzid.into() };
        }
        self
    }

    /// Returns the wall-clock reading.
    #[must_use]
    pub const fn local(&self) -> NaiveDateTime {
        self.local
    }

    /// Returns the calendar date.
    #[must_use]
    pub fn date_part(&self) -> NaiveDate {
        self.local.date()
    }

    /// Returns the form of this value.
    #[must_use]
    pub const fn form(&self) -> &DateTimeForm {
        &self.form
    }

    /// Returns whether this is a DATE (no time of day).
    #[must_use]
    pub const fn is_date_only(&self) -> bool {
        self.date_only
    }

    /// Returns whether this is a UTC time.
    #[must_use]
    pub fn is_utc(&self) -> bool {
        matches!(self.form, DateTimeForm::Utc)
    }

    /// Returns whether this is a floating time.
    #[must_use]
    pub fn is_floating(&self) -> bool {
        matches!(self.form, DateTimeForm::Floating)
    }

    /// Returns the timezone ID if this is a zoned time.
    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        match &self.form {
            DateTimeForm::Zoned { tzid } => Some(tzid),
            DateTimeForm::Floating | DateTimeForm::Utc => None,
        }
    }

    /// Returns a value with the same form and date-only flag at another
    /// wall-clock reading. Date-only values drop the time of day.
    #[must_use]
    pub fn with_local(&self, local: NaiveDateTime) -> Self {
        let local = if self.date_only {
            local.date().and_time(NaiveTime::MIN)
        } else {
            local
        };
        Self {
            local,
            form: self.form.clone(),
            date_only: self.date_only,
        }
    }

    /// Adds an iCalendar duration to the wall-clock reading.
    ///
    /// Days and weeks are nominal, hours and smaller are exact; both are applied
    /// to the wall clock. Returns `None` on calendar overflow.
    #[must_use]
    pub fn checked_add(&self, duration: &Duration) -> Option<Self> {
        let local = self.local.checked_add_signed(duration.to_time_delta())?;
        // A DATE plus a duration with a time part becomes a DATE-TIME.
        let date_only = self.date_only && duration.is_whole_days();
        Some(Self {
            local,
            form: self.form.clone(),
            date_only,
        })
    }
}

fn naive(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}{:02}{:02}",
            self.local.year(),
            self.local.month(),
            self.local.day()
        )?;
        if self.date_only {
            return Ok(());
        }
        write!(
            f,
            "T{:02}{:02}{:02}",
            self.local.hour(),
            self.local.minute(),
            self.local.second()
        )?;
        if self.is_utc() {
            write!(f, "Z")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_display() {
        let dt = DateTime::utc(2026, 1, 23, 12, 0, 0).unwrap();
        assert_eq!(dt.to_string(), "20260123T120000Z");

        let dt = DateTime::floating(2026, 1, 23, 12, 0, 0).unwrap();
        assert_eq!(dt.to_string(), "20260123T120000");

        let dt = DateTime::from_ymd(2026, 1, 23).unwrap();
        assert_eq!(dt.to_string(), "20260123");
    }

    #[test]
    fn zoned_value_keeps_tzid() {
        let dt = DateTime::zoned(2026, 3, 1, 9, 0, 0, "Europe/Berlin").unwrap();
        assert_eq!(dt.tzid(), Some("Europe/Berlin"));
        assert!(!dt.is_floating());
        assert_eq!(dt.to_string(), "20260301T090000");
    }

    #[test]
    fn in_zone_does_not_override_utc() {
        let dt = DateTime::utc(2026, 3, 1, 9, 0, 0).unwrap().in_zone("Europe/Berlin");
        assert!(dt.is_utc());
    }

    #[test]
    fn invalid_components_are_rejected() {
        assert!(DateTime::floating(2026, 2, 30, 0, 0, 0).is_none());
        assert!(DateTime::from_ymd(2026, 13, 1).is_none());
    }

    #[test]
    fn with_local_truncates_dates() {
        let date = DateTime::from_ymd(2026, 1, 1).unwrap();
        let moved = date.with_local(naive(2026, 1, 5, 10, 30, 0).unwrap());
        assert!(moved.is_date_only());
        assert_eq!(moved.to_string(), "20260105");
    }

    #[test]
    fn checked_add_date_and_time() {
        let date = DateTime::from_ymd(2026, 1, 31).unwrap();
        let next = date.checked_add(&Duration::days(1)).unwrap();
        assert_eq!(next.to_string(), "20260201");
        assert!(next.is_date_only());

        let with_time = date.checked_add(&Duration::hours(3)).unwrap();
        assert!(!with_time.is_date_only());
        assert_eq!(with_time.to_string(), "20260131T030000");
    }
}
