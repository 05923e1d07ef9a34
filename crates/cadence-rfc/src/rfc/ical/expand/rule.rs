//! Single-rule evaluation (RFC 5545 §3.3.10).
//!
//! A [`RuleEvaluator`] walks the periods of one RRULE or EXRULE in the
//! anchor's wall-clock frame. Each period is expanded into its full candidate
//! set by the BY-filters (`BYMONTH`, `BYWEEKNO`, `BYYEARDAY`, `BYMONTHDAY`,
//! `BYDAY`, `BYHOUR`, `BYMINUTE`, `BYSECOND`), narrowed by `BYSETPOS`, and
//! handed out one value at a time. Missing day filters are derived from
//! DTSTART: weekly rules reuse its weekday, monthly rules its day of month,
//! yearly rules its month and day.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};

use super::error::{RecurrenceError, RecurrenceResult};
use super::merge::{Candidate, OccurrenceKey};
use super::options::EvaluationOptions;
use super::timezone::ResolveTimeZone;
use crate::rfc::ical::core::{DateTime, Frequency, RRule};

/// Last year the evaluator will enter.
const MAX_YEAR: i32 = 9999;

/// Slack used when comparing wall-clock period starts with UTC bounds.
/// Larger than any UTC offset.
const FRAME_SLACK: TimeDelta = TimeDelta::days(1);

/// Which period an ordinal BYDAY entry counts within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrdinalScope {
    Month,
    Year,
}

/// BY-filters with implicit values filled in from DTSTART.
#[derive(Debug, Clone)]
struct Filters {
    months: Vec<u32>,
    week_numbers: Vec<i64>,
    year_days: Vec<i64>,
    month_days: Vec<i64>,
    weekdays: Vec<chrono::Weekday>,
    nth_weekdays: Vec<(i64, chrono::Weekday)>,
    ordinal_scope: OrdinalScope,
    week_start: chrono::Weekday,
    hours: Vec<u32>,
    minutes: Vec<u32>,
    seconds: Vec<u32>,
}

impl Filters {
    fn new(rule: &RRule, anchor: NaiveDateTime) -> Self {
        let mut months: Vec<u32> = rule.by_month.iter().copied().map(u32::from).collect();
        let mut month_days: Vec<i64> = rule.by_monthday.iter().copied().map(i64::from).collect();
        let mut weekdays = Vec::new();
        let mut nth_weekdays = Vec::new();

        // Ordinals only mean something when the period is a month or a year.
        let ordinals_apply = matches!(rule.freq, Frequency::Monthly | Frequency::Yearly);
        for day in &rule.by_day {
            let weekday = day.weekday.to_chrono();
            match day.ordinal {
                Some(n) if ordinals_apply => nth_weekdays.push((i64::from(n), weekday)),
                _ => weekdays.push(weekday),
            }
        }

        let no_day_filters = rule.by_weekno.is_empty()
            && rule.by_yearday.is_empty()
            && rule.by_monthday.is_empty()
            && rule.by_day.is_empty();
        if no_day_filters {
            match rule.freq {
                Frequency::Yearly => {
                    if months.is_empty() {
                        months.push(anchor.month());
                    }
                    month_days.push(i64::from(anchor.day()));
                }
                Frequency::Monthly => month_days.push(i64::from(anchor.day())),
                Frequency::Weekly => weekdays.push(anchor.weekday()),
                Frequency::Daily
                | Frequency::Hourly
                | Frequency::Minutely
                | Frequency::Secondly => {}
            }
        }

        let ordinal_scope = if rule.freq == Frequency::Monthly || !months.is_empty() {
            OrdinalScope::Month
        } else {
            OrdinalScope::Year
        };

        Self {
            months,
            week_numbers: rule.by_weekno.iter().copied().map(i64::from).collect(),
            year_days: rule.by_yearday.iter().copied().map(i64::from).collect(),
            month_days,
            weekdays,
            nth_weekdays,
            ordinal_scope,
            week_start: rule.week_start().to_chrono(),
            hours: rule.by_hour.iter().copied().map(u32::from).collect(),
            minutes: rule.by_minute.iter().copied().map(u32::from).collect(),
            seconds: rule.by_second.iter().copied().map(u32::from).collect(),
        }
    }

    /// Applies the day-level filters to one calendar day.
    fn day_matches(&self, date: NaiveDate) -> bool {
        if !self.months.is_empty() && !self.months.contains(&date.month()) {
            return false;
        }

        if !self.week_numbers.is_empty() {
            let Some((number, total)) = week_number(date, self.week_start) else {
                return false;
            };
            if !self
                .week_numbers
                .iter()
                .any(|&n| signed_matches(n, number, total))
            {
                return false;
            }
        }

        if !self.year_days.is_empty() {
            let total = i64::from(days_in_year(date.year()));
            let ordinal = i64::from(date.ordinal());
            if !self
                .year_days
                .iter()
                .any(|&n| signed_matches(n, ordinal, total))
            {
                return false;
            }
        }

        if !self.month_days.is_empty() {
            let total = i64::from(days_in_month(date.year(), date.month()));
            let day = i64::from(date.day());
            if !self
                .month_days
                .iter()
                .any(|&n| signed_matches(n, day, total))
            {
                return false;
            }
        }

        if self.weekdays.is_empty() && self.nth_weekdays.is_empty() {
            return true;
        }
        self.weekdays.contains(&date.weekday()) || self.nth_weekday_matches(date)
    }

    fn nth_weekday_matches(&self, date: NaiveDate) -> bool {
        let (position, total) = match self.ordinal_scope {
            OrdinalScope::Month => (
                i64::from(date.day()),
                i64::from(days_in_month(date.year(), date.month())),
            ),
            OrdinalScope::Year => (
                i64::from(date.ordinal()),
                i64::from(days_in_year(date.year())),
            ),
        };
        let from_start = (position - 1) / 7 + 1;
        let from_end = (total - position) / 7 + 1;

        self.nth_weekdays.iter().any(|&(n, weekday)| {
            weekday == date.weekday() && ((n > 0 && n == from_start) || (n < 0 && -n == from_end))
        })
    }
}

/// Returns whether a signed BY-value selects `value` in a range of `total` (1-based).
fn signed_matches(n: i64, value: i64, total: i64) -> bool {
    if n > 0 {
        n == value
    } else {
        total + 1 + n == value
    }
}

fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

fn days_in_year(year: i32) -> u32 {
    if is_leap_year(year) { 366 } else { 365 }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 31,
    }
}

/// First day of the week containing `date`, for weeks beginning on `week_start`.
fn start_of_week(date: NaiveDate, week_start: chrono::Weekday) -> Option<NaiveDate> {
    let offset =
        (7 + date.weekday().num_days_from_monday() - week_start.num_days_from_monday()) % 7;
    date.checked_sub_days(Days::new(u64::from(offset)))
}

/// Week number of `date` and the number of weeks in its week-numbering year.
///
/// Week 1 is the first week with at least four days in the calendar year.
fn week_number(date: NaiveDate, week_start: chrono::Weekday) -> Option<(i64, i64)> {
    let start = start_of_week(date, week_start)?;
    let year = start.checked_add_days(Days::new(3))?.year();
    let first = start_of_week(NaiveDate::from_ymd_opt(year, 1, 4)?, week_start)?;
    let next = start_of_week(NaiveDate::from_ymd_opt(year + 1, 1, 4)?, week_start)?;

    let number = (start - first).num_days() / 7 + 1;
    let total = (next - first).num_days() / 7;
    Some((number, total))
}

/// Keeps the 1-based (or negative, from the end) positions of a sorted set.
fn select_positions(candidates: &[NaiveDateTime], positions: &[i16]) -> Vec<NaiveDateTime> {
    let Ok(len) = i64::try_from(candidates.len()) else {
        return Vec::new();
    };
    let mut selected: Vec<NaiveDateTime> = positions
        .iter()
        .filter_map(|&position| {
            let position = i64::from(position);
            let index = if position > 0 {
                position - 1
            } else {
                len + position
            };
            usize::try_from(index)
                .ok()
                .and_then(|i| candidates.get(i))
                .copied()
        })
        .collect();
    selected.sort_unstable();
    selected.dedup();
    selected
}

/// Lazy, resumable expansion of one recurrence rule.
///
/// Values come out strictly ascending and never before the anchor. The
/// evaluator can be paused by a horizon: it will not open a period that lies
/// wholly after the horizon until the horizon is moved or cleared.
pub struct RuleEvaluator {
    rule: RRule,
    anchor: DateTime,
    resolver: Arc<dyn ResolveTimeZone>,
    filters: Filters,
    /// Times of day for daily and coarser frequencies.
    times: Vec<NaiveTime>,
    /// Start of period 0 in the anchor's frame.
    base: NaiveDateTime,
    until: Option<NaiveDateTime>,
    horizon: Option<NaiveDateTime>,
    max_empty_periods: u32,
    period: i64,
    pending: VecDeque<NaiveDateTime>,
    emitted: u32,
    last: Option<OccurrenceKey>,
    empty_run: u32,
    exhausted: bool,
}

impl RuleEvaluator {
    /// ## Summary
    /// Creates an evaluator for `rule` anchored at `anchor`.
    ///
    /// ## Errors
    /// Returns `RecurrenceError::Conversion` if UNTIL cannot be placed on the
    /// timeline, or `InvalidRecurrence` if the anchor's week cannot be computed.
    pub fn new(
        rule: RRule,
        anchor: DateTime,
        resolver: Arc<dyn ResolveTimeZone>,
        options: &EvaluationOptions,
    ) -> RecurrenceResult<Self> {
        let local = anchor.local();
        let filters = Filters::new(&rule, local);

        let times = if anchor.is_date_only() {
            vec![NaiveTime::MIN]
        } else {
            let hours = or_anchor(&filters.hours, local.hour());
            let minutes = &or_anchor(&filters.minutes, local.minute());
            let seconds = &or_anchor(&filters.seconds, local.second());
            let mut times: Vec<NaiveTime> = hours
                .iter()
                .flat_map(|&h| {
                    minutes.iter().flat_map(move |&m| {
                        seconds
                            .iter()
                            .filter_map(move |&s| NaiveTime::from_hms_opt(h, m, s))
                    })
                })
                .collect();
            times.sort_unstable();
            times.dedup();
            times
        };

        let base = match rule.freq {
            Frequency::Weekly => start_of_week(local.date(), filters.week_start)
                .ok_or_else(|| RecurrenceError::invalid("DTSTART", "week start out of range"))?
                .and_time(NaiveTime::MIN),
            Frequency::Yearly | Frequency::Monthly | Frequency::Daily => {
                local.date().and_time(NaiveTime::MIN)
            }
            Frequency::Hourly => local
                .date()
                .and_hms_opt(local.hour(), 0, 0)
                .unwrap_or(local),
            Frequency::Minutely => local
                .date()
                .and_hms_opt(local.hour(), local.minute(), 0)
                .unwrap_or(local),
            Frequency::Secondly => local,
        };

        let until = match &rule.until {
            Some(until) => Some(until_instant(until, &anchor, resolver.as_ref())?),
            None => None,
        };

        Ok(Self {
            rule,
            anchor,
            resolver,
            filters,
            times,
            base,
            until,
            horizon: None,
            max_empty_periods: options.max_empty_periods.max(1),
            period: 0,
            pending: VecDeque::new(),
            emitted: 0,
            last: None,
            empty_run: 0,
            exhausted: false,
        })
    }

    /// Returns the rule being evaluated.
    #[must_use]
    pub const fn rule(&self) -> &RRule {
        &self.rule
    }

    /// Returns whether the rule has produced its last value.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Sets the instant past which no new period is opened. `None` removes
    /// the limit.
    pub fn set_horizon(&mut self, horizon: Option<NaiveDateTime>) {
        self.horizon = horizon;
    }

    /// ## Summary
    /// Returns the next value of the rule.
    ///
    /// `Ok(None)` means the rule is exhausted (see [`Self::is_exhausted`]) or
    /// paused at the horizon.
    ///
    /// ## Errors
    /// Returns `EvaluationSafetyLimitExceeded` if an unbounded rule keeps
    /// producing empty periods with no horizon set, or `Conversion` if a
    /// zoned value cannot be resolved.
    pub fn next_candidate(&mut self) -> RecurrenceResult<Option<Candidate>> {
        loop {
            if self.exhausted {
                return Ok(None);
            }
            if self.rule.count.is_some_and(|count| self.emitted >= count) {
                self.finish();
                return Ok(None);
            }

            let Some(local) = self.pending.pop_front() else {
                if self.fill_next_period()? {
                    continue;
                }
                return Ok(None);
            };

            let value = self.anchor.with_local(local);
            let instant = self.resolver.instant(&value)?;
            let key = OccurrenceKey::new(instant, value.is_date_only());

            if self.until.is_some_and(|until| instant > until) {
                self.finish();
                return Ok(None);
            }
            // Date-only truncation and DST folds can repeat an instant.
            if self.last.is_some_and(|last| key <= last) {
                continue;
            }

            self.last = Some(key);
            self.emitted += 1;
            return Ok(Some(Candidate::new(key, value)));
        }
    }

    fn finish(&mut self) {
        self.exhausted = true;
        self.pending.clear();
        tracing::trace!(rule = %self.rule, emitted = self.emitted, "Rule exhausted");
    }

    /// Loads the next non-empty period into `pending`. Returns `false` when
    /// the rule is exhausted or paused.
    fn fill_next_period(&mut self) -> RecurrenceResult<bool> {
        loop {
            let Some(start) = self.period_start(self.period) else {
                self.finish();
                return Ok(false);
            };
            if start.year() > MAX_YEAR {
                self.finish();
                return Ok(false);
            }
            if self.until.is_some_and(|until| is_beyond(start, until)) {
                self.finish();
                return Ok(false);
            }
            if self.horizon.is_some_and(|horizon| is_beyond(start, horizon)) {
                return Ok(false);
            }

            let mut candidates = if self.rule.freq.is_sub_daily() {
                self.expand_sub_daily(start)
            } else {
                self.period += 1;
                self.expand_days(start)
            };

            if !self.rule.by_setpos.is_empty() {
                candidates = select_positions(&candidates, &self.rule.by_setpos);
            }
            let anchor = self.anchor.local();
            candidates.retain(|candidate| *candidate >= anchor);

            if candidates.is_empty() {
                self.empty_run += 1;
                if self.empty_run >= self.max_empty_periods {
                    self.trip_safety_limit()?;
                }
                continue;
            }

            self.empty_run = 0;
            self.pending = candidates.into();
            return Ok(true);
        }
    }

    /// Bounded rules and rules with a horizon keep scanning; the bound or the
    /// horizon ends the scan. Anything else is an error.
    fn trip_safety_limit(&mut self) -> RecurrenceResult<()> {
        if self.rule.is_bounded() || self.horizon.is_some() {
            tracing::debug!(
                rule = %self.rule,
                periods = self.empty_run,
                "Empty periods exceeded lookahead, continuing towards bound"
            );
            self.empty_run = 0;
            return Ok(());
        }

        tracing::warn!(
            rule = %self.rule,
            periods = self.empty_run,
            "Unbounded rule produced no occurrences within lookahead"
        );
        self.exhausted = true;
        Err(RecurrenceError::EvaluationSafetyLimitExceeded {
            rule: self.rule.to_string(),
            periods: self.empty_run,
        })
    }

    /// Wall-clock start of period `index`.
    fn period_start(&self, index: i64) -> Option<NaiveDateTime> {
        let steps = index.checked_mul(i64::from(self.rule.interval))?;
        match self.rule.freq {
            Frequency::Yearly => {
                let year = i64::from(self.base.year()).checked_add(steps)?;
                let year = i32::try_from(year).ok()?;
                NaiveDate::from_ymd_opt(year, 1, 1).map(|d| d.and_time(NaiveTime::MIN))
            }
            Frequency::Monthly => {
                let months = i64::from(self.base.year()) * 12 + i64::from(self.base.month0());
                let months = months.checked_add(steps)?;
                let year = i32::try_from(months.div_euclid(12)).ok()?;
                let month = u32::try_from(months.rem_euclid(12)).ok()? + 1;
                NaiveDate::from_ymd_opt(year, month, 1).map(|d| d.and_time(NaiveTime::MIN))
            }
            Frequency::Weekly => {
                let days = u64::try_from(steps.checked_mul(7)?).ok()?;
                self.base.checked_add_days(Days::new(days))
            }
            Frequency::Daily => self.base.checked_add_days(Days::new(u64::try_from(steps).ok()?)),
            Frequency::Hourly => self
                .base
                .checked_add_signed(TimeDelta::try_hours(steps)?),
            Frequency::Minutely => self
                .base
                .checked_add_signed(TimeDelta::try_minutes(steps)?),
            Frequency::Secondly => self
                .base
                .checked_add_signed(TimeDelta::try_seconds(steps)?),
        }
    }

    /// Candidates of a daily, weekly, monthly or yearly period.
    fn expand_days(&self, start: NaiveDateTime) -> Vec<NaiveDateTime> {
        let first = start.date();
        let length = match self.rule.freq {
            Frequency::Yearly => days_in_year(first.year()),
            Frequency::Monthly => days_in_month(first.year(), first.month()),
            Frequency::Weekly => 7,
            Frequency::Daily
            | Frequency::Hourly
            | Frequency::Minutely
            | Frequency::Secondly => 1,
        };

        (0..u64::from(length))
            .filter_map(|offset| first.checked_add_days(Days::new(offset)))
            .filter(|day| self.filters.day_matches(*day))
            .flat_map(|day| self.times.iter().map(move |time| day.and_time(*time)))
            .collect()
    }

    /// Candidates of an hourly, minutely or secondly period. Periods on days
    /// (or hours, minutes) the filters reject are skipped in one step.
    fn expand_sub_daily(&mut self, start: NaiveDateTime) -> Vec<NaiveDateTime> {
        let date = start.date();
        if !self.filters.day_matches(date) {
            self.skip_to(date.succ_opt().map(|d| d.and_time(NaiveTime::MIN)));
            return Vec::new();
        }

        let hours = &self.filters.hours;
        if !hours.is_empty() && !hours.contains(&start.hour()) {
            let next_hour = date
                .and_hms_opt(start.hour(), 0, 0)
                .and_then(|h| h.checked_add_signed(TimeDelta::hours(1)));
            self.skip_to(next_hour);
            return Vec::new();
        }

        let minutes = &self.filters.minutes;
        if self.rule.freq != Frequency::Hourly
            && !minutes.is_empty()
            && !minutes.contains(&start.minute())
        {
            let next_minute = date
                .and_hms_opt(start.hour(), start.minute(), 0)
                .and_then(|m| m.checked_add_signed(TimeDelta::minutes(1)));
            self.skip_to(next_minute);
            return Vec::new();
        }

        self.period += 1;
        let anchor = self.anchor.local();
        match self.rule.freq {
            Frequency::Hourly => {
                let minutes = or_anchor(&self.filters.minutes, anchor.minute());
                let seconds = or_anchor(&self.filters.seconds, anchor.second());
                let mut out: Vec<NaiveDateTime> = minutes
                    .iter()
                    .flat_map(|&m| {
                        seconds
                            .iter()
                            .filter_map(move |&s| date.and_hms_opt(start.hour(), m, s))
                    })
                    .collect();
                out.sort_unstable();
                out.dedup();
                out
            }
            Frequency::Minutely => {
                let seconds = or_anchor(&self.filters.seconds, anchor.second());
                let mut out: Vec<NaiveDateTime> = seconds
                    .iter()
                    .filter_map(|&s| date.and_hms_opt(start.hour(), start.minute(), s))
                    .collect();
                out.sort_unstable();
                out.dedup();
                out
            }
            Frequency::Secondly => {
                let seconds = &self.filters.seconds;
                if seconds.is_empty() || seconds.contains(&start.second()) {
                    vec![start]
                } else {
                    Vec::new()
                }
            }
            Frequency::Daily | Frequency::Weekly | Frequency::Monthly | Frequency::Yearly => {
                Vec::new()
            }
        }
    }

    /// Moves to the first period starting at or after `target`.
    fn skip_to(&mut self, target: Option<NaiveDateTime>) {
        let step = match self.rule.freq {
            Frequency::Hourly => 3600,
            Frequency::Minutely => 60,
            Frequency::Secondly
            | Frequency::Daily
            | Frequency::Weekly
            | Frequency::Monthly
            | Frequency::Yearly => 1,
        } * i64::from(self.rule.interval);

        let next = target
            .map(|target| (target - self.base).num_seconds())
            .map(|offset| offset.div_euclid(step) + i64::from(offset.rem_euclid(step) != 0));

        self.period = match next {
            Some(next) if next > self.period => next,
            _ => self.period + 1,
        };
    }
}

/// Returns whether a wall-clock period start lies after a UTC bound in any frame.
fn is_beyond(start: NaiveDateTime, bound: NaiveDateTime) -> bool {
    bound
        .checked_add_signed(FRAME_SLACK)
        .is_some_and(|limit| start > limit)
}

fn or_anchor(values: &[u32], anchor: u32) -> Vec<u32> {
    if values.is_empty() {
        vec![anchor]
    } else {
        values.to_vec()
    }
}

/// Places UNTIL on the timeline. Floating and date-only bounds are read in the
/// anchor's frame; a date-only bound on a date-time rule covers the whole day.
fn until_instant(
    until: &DateTime,
    anchor: &DateTime,
    resolver: &dyn ResolveTimeZone,
) -> RecurrenceResult<NaiveDateTime> {
    if until.is_utc() {
        return Ok(until.local());
    }

    let local = if until.is_date_only() && !anchor.is_date_only() {
        until
            .date_part()
            .and_hms_opt(23, 59, 59)
            .unwrap_or_else(|| until.local())
    } else {
        until.local()
    };

    let bound = if until.tzid().is_some() {
        DateTime::new(local, until.form().clone())
    } else {
        DateTime::new(local, anchor.form().clone())
    };
    Ok(resolver.instant(&bound)?)
}

impl std::fmt::Debug for RuleEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEvaluator")
            .field("rule", &self.rule.to_string())
            .field("anchor", &self.anchor)
            .field("period", &self.period)
            .field("emitted", &self.emitted)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "rule_tests.rs"]
mod tests;
