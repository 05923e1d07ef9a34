//! Alarm polling (RFC 5545 §3.6.6, §3.8.6.3).
//!
//! Each alarm is polled as its own stream over the component's occurrences,
//! in the order the alarms are declared. A relative trigger is measured from
//! the start or end of every occurrence; an absolute trigger fires once. An
//! alarm stops at its first trigger at or after the end of the polling range.
//!
//! Occurrences are only evaluated over the polling range shifted back by the
//! trigger offset, so an end bound also bounds rule evaluation.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};

use super::error::{RecurrenceError, RecurrenceResult};
use super::occurrence::{Occurrence, Occurrences};
use super::options::Window;
use super::timezone::ResolveTimeZone;
use crate::rfc::ical::core::{
    Alarm, AlarmTrigger, DateTime, DateTimeForm, Duration, HasRecurrence, PeriodSpan,
    TriggerRelation,
};

/// Margin added to shifted bounds; offsets are applied to wall-clock time, so
/// a DST transition can move a trigger by up to an hour.
const SHIFT_SLACK: TimeDelta = TimeDelta::days(1);

/// A trigger time of an alarm.
#[derive(Clone)]
pub struct AlarmOccurrence<'a> {
    pub alarm: &'a Alarm,
    /// The occurrence the trigger was derived from; `None` for absolute triggers.
    pub occurrence: Option<Occurrence<'a>>,
    pub trigger: DateTime,
}

impl fmt::Debug for AlarmOccurrence<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlarmOccurrence")
            .field("action", &self.alarm.action)
            .field("occurrence", &self.occurrence)
            .field("trigger", &self.trigger)
            .finish()
    }
}

/// Alarm currently being polled.
struct ActiveAlarm<'a> {
    alarm: &'a Alarm,
    offset: Duration,
    related: TriggerRelation,
    occurrences: Occurrences<'a>,
}

/// Lazy trigger times of every alarm of a component within `[start, end)`.
pub struct AlarmOccurrences<'a> {
    source: &'a dyn HasRecurrence,
    resolver: Arc<dyn ResolveTimeZone>,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    alarms: std::slice::Iter<'a, Alarm>,
    active: Option<ActiveAlarm<'a>>,
    pending: VecDeque<AlarmOccurrence<'a>>,
}

impl<'a> AlarmOccurrences<'a> {
    /// ## Summary
    /// Starts polling the alarms of `source`.
    ///
    /// ## Errors
    /// Returns `WindowOrder` if `end` precedes `start`, or `Conversion` if a
    /// zoned bound cannot be resolved.
    pub fn new(
        source: &'a dyn HasRecurrence,
        start: Option<&DateTime>,
        end: Option<&DateTime>,
    ) -> RecurrenceResult<Self> {
        let resolver = Arc::clone(source.recurrence().resolver());
        let start_instant = start.map(|s| resolver.instant(s)).transpose()?;
        let end_instant = end.map(|e| resolver.instant(e)).transpose()?;

        if let (Some(s), Some(e)) = (start_instant, end_instant)
            && e < s
        {
            return Err(RecurrenceError::WindowOrder {
                start: start.map(ToString::to_string).unwrap_or_default(),
                end: end.map(ToString::to_string).unwrap_or_default(),
            });
        }

        Ok(Self {
            source,
            resolver,
            start: start_instant,
            end: end_instant,
            alarms: source.alarms().iter(),
            active: None,
            pending: VecDeque::new(),
        })
    }

    /// Queues the in-range triggers of one base trigger and its repeats.
    /// Returns `false` once a trigger reaches the end of the range.
    fn queue(
        &mut self,
        alarm: &'a Alarm,
        first: DateTime,
        occurrence: Option<&Occurrence<'a>>,
    ) -> RecurrenceResult<bool> {
        let (count, interval) = alarm
            .repeat
            .map_or((0, None), |repeat| (repeat.count, Some(repeat.interval)));

        let mut trigger = first;
        for repetition in 0..=count {
            if repetition > 0 {
                let Some(next) = interval.and_then(|step| trigger.checked_add(&step)) else {
                    break;
                };
                trigger = next;
            }

            let instant = self.resolver.instant(&trigger)?;
            if self.end.is_some_and(|end| instant >= end) {
                return Ok(false);
            }
            if self.start.is_some_and(|start| instant < start) {
                continue;
            }
            self.pending.push_back(AlarmOccurrence {
                alarm,
                occurrence: occurrence.cloned(),
                trigger: trigger.clone(),
            });
        }
        Ok(true)
    }

    /// ## Summary
    /// Window of occurrences whose triggers can fall in the polling range.
    ///
    /// The lower bound moves back by the offset, the repeat span and, for
    /// END-related triggers, the longest occurrence. The upper bound moves
    /// back by the offset only. Bounds that overflow are left open.
    ///
    /// ## Errors
    /// Returns `Conversion` if an RDATE span cannot be resolved.
    fn occurrence_window(
        &self,
        alarm: &Alarm,
        offset: Duration,
        related: TriggerRelation,
    ) -> RecurrenceResult<Window> {
        let offset = offset.to_time_delta();

        let mut reach = Some(SHIFT_SLACK);
        if let Some(repeat) = alarm.repeat {
            let span = i32::try_from(repeat.count)
                .ok()
                .and_then(|count| repeat.interval.to_time_delta().checked_mul(count));
            reach = reach.zip(span).and_then(|(r, s)| r.checked_add(&s.abs()));
        }
        if related == TriggerRelation::End {
            let longest = self.longest_span()?;
            reach = reach.and_then(|r| r.checked_add(&longest));
        }

        let start = self.start.zip(reach).and_then(|(start, reach)| {
            start
                .checked_sub_signed(offset)?
                .checked_sub_signed(reach)
        });
        let end = self.end.and_then(|end| {
            end.checked_sub_signed(offset)?
                .checked_add_signed(SHIFT_SLACK)
        });

        let bound = |instant: NaiveDateTime| DateTime::new(instant, DateTimeForm::Utc);
        Ok(Window::new(start.map(bound), end.map(bound)))
    }

    /// Longest extent an occurrence of the source can have.
    fn longest_span(&self) -> RecurrenceResult<TimeDelta> {
        let mut longest = self
            .source
            .duration()
            .as_ref()
            .map_or(TimeDelta::zero(), Duration::to_time_delta);

        for period in self.source.recurrence().rdates().iter() {
            let span = match &period.span {
                Some(PeriodSpan::Duration(duration)) => duration.to_time_delta(),
                Some(PeriodSpan::End(end)) => {
                    self.resolver.instant(end)? - self.resolver.instant(&period.start)?
                }
                None => TimeDelta::zero(),
            };
            longest = longest.max(span);
        }
        Ok(longest)
    }

    /// Polls the next step: one occurrence of the active alarm, or the next
    /// alarm. Returns `Ok(false)` when every alarm is done.
    fn step(&mut self) -> RecurrenceResult<bool> {
        if let Some(mut active) = self.active.take() {
            let Some(occurrence) = active.occurrences.next().transpose()? else {
                return Ok(true);
            };

            let base = match active.related {
                TriggerRelation::Start => occurrence.start().clone(),
                TriggerRelation::End => occurrence.end(),
            };
            let Some(first) = base.checked_add(&active.offset) else {
                return Ok(true);
            };
            if self.queue(active.alarm, first, Some(&occurrence))? {
                self.active = Some(active);
            }
            return Ok(true);
        }

        let Some(alarm) = self.alarms.next() else {
            return Ok(false);
        };
        match &alarm.trigger {
            AlarmTrigger::Absolute(at) => {
                self.queue(alarm, at.clone(), None)?;
            }
            AlarmTrigger::Relative { offset, related } => {
                let window = self.occurrence_window(alarm, *offset, *related)?;
                tracing::trace!(?window, action = %alarm.action, "Polling relative alarm");
                self.active = Some(ActiveAlarm {
                    alarm,
                    offset: *offset,
                    related: *related,
                    occurrences: Occurrences::new(self.source, &window)?,
                });
            }
        }
        Ok(true)
    }
}

impl<'a> Iterator for AlarmOccurrences<'a> {
    type Item = RecurrenceResult<AlarmOccurrence<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(found) = self.pending.pop_front() {
                return Some(Ok(found));
            }
            match self.step() {
                Ok(true) => {}
                Ok(false) => return None,
                Err(err) => {
                    self.active = None;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl fmt::Debug for AlarmOccurrences<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlarmOccurrences")
            .field("source", &self.source.uid())
            .field("start", &self.start)
            .field("end", &self.end)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfc::ical::core::{Event, Period, RRule};

    fn at(day: u32, hour: u32, minute: u32) -> DateTime {
        DateTime::floating(2026, 5, day, hour, minute, 0).unwrap()
    }

    fn daily_standup(alarms: Vec<Alarm>) -> Event {
        let mut event = Event::new(at(4, 9, 0)).with_duration(Duration::minutes(30));
        event.alarms = alarms;
        event
            .recurrence_mut()
            .add_rrule(RRule::daily().with_count(3))
            .unwrap();
        event
    }

    fn triggers(polled: AlarmOccurrences<'_>) -> Vec<String> {
        polled
            .map(|found| found.unwrap().trigger.to_string())
            .collect()
    }

    #[test]
    fn relative_to_start() {
        let event = daily_standup(vec![Alarm::display(
            AlarmTrigger::before_start(Duration::minutes(15)),
            "Standup",
        )]);
        assert_eq!(
            triggers(event.poll_alarms(None, None).unwrap()),
            ["20260504T084500", "20260505T084500", "20260506T084500"]
        );
    }

    #[test]
    fn relative_to_end() {
        let alarm = Alarm::display(
            AlarmTrigger::Relative {
                offset: Duration::minutes(5),
                related: TriggerRelation::End,
            },
            "Wrap up",
        );
        let event = daily_standup(vec![alarm]);
        let first = event.poll_alarms(None, None).unwrap().next().unwrap().unwrap();

        assert_eq!(first.trigger.to_string(), "20260504T093500");
        let occurrence = first.occurrence.unwrap();
        assert_eq!(occurrence.start().to_string(), "20260504T090000");
        assert_eq!(occurrence.end().to_string(), "20260504T093000");
    }

    #[test]
    fn repeats_follow_each_trigger() {
        let alarm = Alarm::display(AlarmTrigger::before_start(Duration::minutes(15)), "Standup")
            .with_repeat(2, Duration::minutes(5));
        let event = daily_standup(vec![alarm]);
        let all = triggers(event.poll_alarms(None, None).unwrap());
        assert_eq!(all.len(), 9);
        assert_eq!(
            &all[..3],
            ["20260504T084500", "20260504T085000", "20260504T085500"]
        );
    }

    #[test_log::test]
    fn range_drops_early_and_stops_at_end() {
        let alarm = Alarm::display(AlarmTrigger::before_start(Duration::minutes(15)), "Standup")
            .with_repeat(2, Duration::minutes(5));
        let event = daily_standup(vec![alarm]);

        let start = at(5, 0, 0);
        let end = at(6, 8, 50);
        assert_eq!(
            triggers(event.poll_alarms(Some(&start), Some(&end)).unwrap()),
            [
                "20260505T084500",
                "20260505T085000",
                "20260505T085500",
                "20260506T084500",
            ]
        );
    }

    #[test]
    fn alarms_are_polled_one_after_another() {
        let absolute = Alarm::display(AlarmTrigger::Absolute(at(1, 12, 0)), "Prepare agenda");
        let relative = Alarm::display(AlarmTrigger::before_start(Duration::hours(1)), "Standup");
        let event = daily_standup(vec![relative, absolute]);

        let polled: Vec<_> = event
            .poll_alarms(None, None)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        let order: Vec<String> = polled.iter().map(|found| found.trigger.to_string()).collect();
        assert_eq!(
            order,
            [
                "20260504T080000",
                "20260505T080000",
                "20260506T080000",
                "20260501T120000",
            ]
        );
        assert!(polled[3].occurrence.is_none());
        assert_eq!(polled[3].alarm.description.as_deref(), Some("Prepare agenda"));
    }

    #[test]
    fn absolute_trigger_outside_range_is_skipped() {
        let absolute = Alarm::display(AlarmTrigger::Absolute(at(1, 12, 0)), "Prepare agenda");
        let event = daily_standup(vec![absolute]);
        let start = at(2, 0, 0);
        assert!(triggers(event.poll_alarms(Some(&start), None).unwrap()).is_empty());
    }

    fn before_start_alarm() -> Alarm {
        Alarm::display(AlarmTrigger::before_start(Duration::minutes(15)), "Reminder")
    }

    #[test_log::test]
    fn end_bound_limits_sparse_unbounded_rule() {
        // Only DTSTART matches; the rule itself never produces a value.
        let mut event = Event::new(DateTime::floating(2026, 1, 1, 9, 0, 0).unwrap())
            .with_alarm(before_start_alarm());
        event
            .recurrence_mut()
            .add_rrule(RRule::yearly().with_by_month(vec![2]).with_by_monthday(vec![30]))
            .unwrap();

        let end = DateTime::floating(2030, 1, 1, 0, 0, 0).unwrap();
        let polled: Vec<String> = event
            .poll_alarms(None, Some(&end))
            .unwrap()
            .map(|found| found.map(|found| found.trigger.to_string()))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(polled, ["20260101T084500"]);

        let unbounded = event.poll_alarms(None, None).unwrap().collect::<Vec<_>>();
        assert!(matches!(
            unbounded.last(),
            Some(Err(RecurrenceError::EvaluationSafetyLimitExceeded { .. }))
        ));
    }

    #[test]
    fn late_start_evaluates_near_the_range() {
        let mut event = Event::new(DateTime::floating(1990, 1, 1, 9, 0, 0).unwrap())
            .with_alarm(before_start_alarm());
        event.recurrence_mut().add_rrule(RRule::daily()).unwrap();

        let start = at(5, 0, 0);
        let end = at(6, 0, 0);
        assert_eq!(
            triggers(event.poll_alarms(Some(&start), Some(&end)).unwrap()),
            ["20260505T084500"]
        );
        // 4, 5 and 6 May: the range shifted by the offset and the DST margin.
        assert_eq!(event.recurrence().cached_len(), 3);
    }

    #[test]
    fn end_related_window_covers_long_rdates() {
        let mut event = daily_standup(vec![Alarm::display(
            AlarmTrigger::Relative {
                offset: Duration::zero(),
                related: TriggerRelation::End,
            },
            "Offsite over",
        )]);
        event
            .recurrence_mut()
            .add_rdate(Period::with_duration(at(10, 9, 0), Duration::days(3)));

        let start = at(13, 0, 0);
        let end = at(14, 0, 0);
        assert_eq!(
            triggers(event.poll_alarms(Some(&start), Some(&end)).unwrap()),
            ["20260513T090000"]
        );
    }

    #[test]
    fn reversed_range_is_rejected() {
        let event = daily_standup(Vec::new());
        let err = event
            .poll_alarms(Some(&at(6, 0, 0)), Some(&at(5, 0, 0)))
            .unwrap_err();
        assert!(matches!(err, RecurrenceError::WindowOrder { .. }));
    }
}
