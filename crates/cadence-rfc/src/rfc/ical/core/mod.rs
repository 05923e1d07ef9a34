//! iCalendar core models (RFC 5545).
//!
//! Typed values for everything a recurring component needs: DATE and
//! DATE-TIME values, durations, recurrence rules, periods, alarms and the
//! components themselves. Values are validated when they are built, not when
//! they are read.

mod alarm;
mod component;
mod datetime;
mod duration;
mod period;
mod rrule;

pub use alarm::{Alarm, AlarmAction, AlarmRepeat, AlarmTrigger, TriggerRelation};
pub use component::{
    ComponentEnd, ComponentInfo, ComponentKind, Event, HasRecurrence, Journal,
    RecurringComponent, Todo, sort_by_start,
};
pub use datetime::{DateTime, DateTimeForm};
pub use duration::Duration;
pub use period::{Period, PeriodList, PeriodSpan};
pub use rrule::{Frequency, RRule, Validation, Weekday, WeekdayNum};
