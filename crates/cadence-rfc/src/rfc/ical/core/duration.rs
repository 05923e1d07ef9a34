//! iCalendar DURATION value type (RFC 5545 §3.3.6).

use std::fmt;

use chrono::TimeDelta;

/// Duration value (RFC 5545 §3.3.6).
///
/// Represents a duration of time. iCalendar durations can be either:
/// - Week-based: `P1W` (1 week)
/// - Day/time-based: `P1DT2H30M` (1 day, 2 hours, 30 minutes)
///
/// Note: iCalendar does not support year/month designators in durations
/// because months have variable lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Duration {
    /// Whether this duration is negative.
    pub negative: bool,
    /// Number of weeks (mutually exclusive with days/hours/minutes/seconds).
    pub weeks: u32,
    /// Number of days.
    pub days: u32,
    /// Number of hours.
    pub hours: u32,
    /// Number of minutes.
    pub minutes: u32,
    /// Number of seconds.
    pub seconds: u32,
}

impl Duration {
    /// Creates a new zero duration.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            negative: false,
            weeks: 0,
            days: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }

    /// Creates a duration from weeks.
    #[must_use]
    pub const fn weeks(weeks: u32) -> Self {
        Self { weeks, ..Self::zero() }
    }

    /// Creates a duration from days.
    #[must_use]
    pub const fn days(days: u32) -> Self {
        Self { days, ..Self::zero() }
    }

    /// Creates a duration from hours.
    #[must_use]
    pub const fn hours(hours: u32) -> Self {
        Self { hours, ..Self::zero() }
    }

    /// Creates a duration from minutes.
    #[must_use]
    pub const fn minutes(minutes: u32) -> Self {
        Self { minutes, ..Self::zero() }
    }

    /// Creates a duration from seconds.
    #[must_use]
    pub const fn seconds(seconds: u32) -> Self {
        Self { seconds, ..Self::zero() }
    }

    /// Converts an exact span into day/time designators.
    ///
    /// Returns `None` if the span does not fit the `u32` day field.
    #[must_use]
    pub fn from_time_delta(delta: TimeDelta) -> Option<Self> {
        let negative = delta < TimeDelta::zero();
        let total = delta.num_seconds().unsigned_abs();
        let days = u32::try_from(total / 86_400).ok()?;
        let rest = total % 86_400;
        let hours = u32::try_from(rest / 3600).ok()?;
        let minutes = u32::try_from(rest % 3600 / 60).ok()?;
        let seconds = u32::try_from(rest % 60).ok()?;
        Some(Self {
            negative,
            weeks: 0,
            days,
            hours,
            minutes,
            seconds,
        })
    }

    /// Negates this duration.
    #[must_use]
    pub const fn negate(mut self) -> Self {
        self.negative = !self.negative;
        self
    }

    /// Returns whether the duration spans no time at all.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.as_seconds() == 0
    }

    /// Returns whether the duration is a whole number of days (or weeks).
    #[must_use]
    pub const fn is_whole_days(&self) -> bool {
        self.hours == 0 && self.minutes == 0 && self.seconds == 0
    }

    /// Returns the total duration as seconds.
    #[must_use]
    pub const fn as_seconds(&self) -> i64 {
        let total = (self.weeks as i64 * 7 * 24 * 3600)
            + (self.days as i64 * 24 * 3600)
            + (self.hours as i64 * 3600)
            + (self.minutes as i64 * 60)
            + (self.seconds as i64);

        if self.negative { -total } else { total }
    }

    /// Returns the duration as a `chrono` span.
    #[must_use]
    pub fn to_time_delta(&self) -> TimeDelta {
        TimeDelta::seconds(self.as_seconds())
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        write!(f, "P")?;

        if self.weeks > 0 {
            return write!(f, "{}W", self.weeks);
        }
        if self.days > 0 {
            write!(f, "{}D", self.days)?;
        }
        if self.is_whole_days() {
            if self.days == 0 {
                write!(f, "0D")?;
            }
            return Ok(());
        }
        write!(f, "T")?;
        if self.hours > 0 {
            write!(f, "{}H", self.hours)?;
        }
        if self.minutes > 0 {
            write!(f, "{}M", self.minutes)?;
        }
        if self.seconds > 0 {
            write!(f, "{}S", self.seconds)?;
        }
        Ok(())
    }
}
