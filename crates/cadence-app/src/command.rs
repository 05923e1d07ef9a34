//! Command line surface: builds a recurring event from RFC 5545 property
//! values and prints its occurrences or alarm triggers.

use cadence_core::config::Settings;
use cadence_rfc::rfc::ical::core::{
    Alarm, AlarmTrigger, Event, HasRecurrence, TriggerRelation,
};
use cadence_rfc::rfc::ical::expand::{EvaluationOptions, Recurrence, Window};
use cadence_rfc::rfc::ical::parse::{
    parse_date_or_datetime, parse_duration, parse_period_list, parse_rrule,
};
use clap::{Args, Parser, Subcommand};

use crate::error::{AppError, AppResult};

#[derive(Debug, Parser)]
#[command(name = "cadence")]
#[command(about = "Expand iCalendar recurrences and poll their alarms", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the occurrences of a recurring event, one per line
    Expand {
        #[command(flatten)]
        recurrence: RecurrenceArgs,

        #[command(flatten)]
        range: RangeArgs,

        /// Stop after this many occurrences
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the alarm trigger times of a recurring event
    Alarms {
        #[command(flatten)]
        recurrence: RecurrenceArgs,

        #[command(flatten)]
        range: RangeArgs,

        /// TRIGGER value: a duration such as `-PT15M`, or a date-time
        #[arg(long = "trigger", required = true, allow_hyphen_values = true)]
        triggers: Vec<String>,

        /// Measure relative triggers from the end of each occurrence
        #[arg(long)]
        related_end: bool,

        /// Additional triggers after the first one
        #[arg(long, requires = "every")]
        repeat: Option<u32>,

        /// Delay between repeated triggers, e.g. `PT5M`
        #[arg(long, requires = "repeat")]
        every: Option<String>,
    },
}

/// DTSTART, the rule and date lists, and the occurrence extent.
#[derive(Debug, Args)]
pub struct RecurrenceArgs {
    /// DTSTART, e.g. `20260105T090000`, `20260105T140000Z` or `20260105`
    #[arg(long)]
    pub dtstart: String,

    /// TZID applied to DTSTART, DTEND and the date lists
    #[arg(long)]
    pub tzid: Option<String>,

    /// RRULE value; may be repeated
    #[arg(long = "rrule")]
    pub rrules: Vec<String>,

    /// EXRULE value; may be repeated
    #[arg(long = "exrule")]
    pub exrules: Vec<String>,

    /// Comma separated RDATE values (dates, date-times or periods)
    #[arg(long = "rdate")]
    pub rdates: Vec<String>,

    /// Comma separated EXDATE values
    #[arg(long = "exdate")]
    pub exdates: Vec<String>,

    /// DTEND of the first occurrence
    #[arg(long, conflicts_with = "duration")]
    pub dtend: Option<String>,

    /// DURATION of each occurrence, e.g. `PT1H`
    #[arg(long)]
    pub duration: Option<String>,
}

/// Half-open query range.
#[derive(Debug, Args)]
pub struct RangeArgs {
    /// Inclusive range start
    #[arg(long)]
    pub start: Option<String>,

    /// Exclusive range end
    #[arg(long)]
    pub end: Option<String>,
}

impl RangeArgs {
    /// ## Summary
    /// Parses the bounds, reading them in `tzid` when they carry no `Z`.
    ///
    /// ## Errors
    /// Returns a parse error for a malformed bound.
    pub fn window(&self, tzid: Option<&str>) -> AppResult<Window> {
        let parse = |value: Option<&str>| {
            value
                .map(|text| parse_date_or_datetime(text, tzid))
                .transpose()
        };
        Ok(Window::new(
            parse(self.start.as_deref())?,
            parse(self.end.as_deref())?,
        ))
    }
}

/// ## Summary
/// Builds the event described by `args`, checking rules against `options`.
///
/// ## Errors
/// Returns a parse error for malformed values, or a recurrence error for a
/// rule the options reject.
pub fn build_event(args: &RecurrenceArgs, options: EvaluationOptions) -> AppResult<Event> {
    let tzid = args.tzid.as_deref();
    let mut recurrence = Recurrence::new(parse_date_or_datetime(&args.dtstart, tzid)?);
    recurrence.set_options(options)?;

    for text in &args.rrules {
        recurrence.add_rrule(parse_rrule(text)?)?;
    }
    for text in &args.exrules {
        recurrence.add_exrule(parse_rrule(text)?)?;
    }
    for text in &args.rdates {
        for period in parse_period_list(text, tzid)?.iter() {
            recurrence.add_rdate(period.clone());
        }
    }
    for text in &args.exdates {
        for period in parse_period_list(text, tzid)?.iter() {
            recurrence.add_exdate(period.clone());
        }
    }

    let mut event = Event::from_recurrence(recurrence);
    if let Some(ref dtend) = args.dtend {
        event = event.with_end(parse_date_or_datetime(dtend, tzid)?);
    }
    if let Some(ref duration) = args.duration {
        event = event.with_duration(parse_duration(duration)?);
    }
    Ok(event)
}

/// ## Summary
/// Parses one TRIGGER value. Values starting with `P`, `+` or `-` are
/// durations; anything else is an absolute date-time.
///
/// ## Errors
/// Returns a parse error for a malformed value.
pub fn parse_trigger(text: &str, related: TriggerRelation) -> AppResult<AlarmTrigger> {
    if text.starts_with(['P', '+', '-']) {
        return Ok(AlarmTrigger::Relative {
            offset: parse_duration(text)?,
            related,
        });
    }
    Ok(AlarmTrigger::Absolute(parse_date_or_datetime(text, None)?))
}

/// ## Summary
/// Runs a parsed command and returns the lines to print.
///
/// ## Errors
/// Returns an error if an argument is malformed or evaluation fails.
pub fn run(command: &Command, settings: &Settings) -> AppResult<Vec<String>> {
    let options = EvaluationOptions::from(&settings.recurrence);
    match command {
        Command::Expand {
            recurrence,
            range,
            limit,
        } => {
            let event = build_event(recurrence, options)?;
            let window = range.window(recurrence.tzid.as_deref())?;
            expand(&event, &window, *limit)
        }
        Command::Alarms {
            recurrence,
            range,
            triggers,
            related_end,
            repeat,
            every,
        } => {
            let related = if *related_end {
                TriggerRelation::End
            } else {
                TriggerRelation::Start
            };
            let mut event = build_event(recurrence, options)?;
            for text in triggers {
                let mut alarm = Alarm::display(parse_trigger(text, related)?, text.clone());
                if let (Some(count), Some(interval)) = (repeat, every) {
                    alarm = alarm.with_repeat(*count, parse_duration(interval)?);
                }
                event = event.with_alarm(alarm);
            }
            let window = range.window(recurrence.tzid.as_deref())?;
            alarms(&event, &window)
        }
    }
}

/// Returns whether one of the RRULEs of `event` has neither COUNT nor UNTIL.
fn has_unbounded_rule(event: &Event) -> bool {
    event
        .recurrence()
        .rrules()
        .iter()
        .any(|rule| !rule.is_bounded())
}

/// ## Summary
/// Formats the occurrences of `event` in `window`, at most `limit` of them.
///
/// ## Errors
/// Returns `InvalidArgument` if an unbounded rule is expanded with neither a
/// range end nor a limit, otherwise the first evaluation error.
pub fn expand(event: &Event, window: &Window, limit: Option<usize>) -> AppResult<Vec<String>> {
    if window.end.is_none() && limit.is_none() && has_unbounded_rule(event) {
        return Err(AppError::InvalidArgument {
            argument: "end",
            reason: "an unbounded RRULE needs --end or --limit".to_string(),
        });
    }

    let mut lines = Vec::new();
    for occurrence in event
        .get_occurrences(window)?
        .take(limit.unwrap_or(usize::MAX))
    {
        lines.push(occurrence?.to_string());
    }

    tracing::debug!(uid = %event.uid(), count = lines.len(), "Expanded occurrences");
    Ok(lines)
}

/// ## Summary
/// Formats each alarm trigger as `trigger action occurrence-start`, with `-`
/// for triggers that do not belong to an occurrence.
///
/// ## Errors
/// Returns `InvalidArgument` if `event` has no alarms, or if a relative alarm
/// of an unbounded rule is polled without a range end. A reversed range is a
/// `WindowOrder` error; evaluation errors are passed through.
pub fn alarms(event: &Event, window: &Window) -> AppResult<Vec<String>> {
    if event.alarms().is_empty() {
        return Err(AppError::InvalidArgument {
            argument: "trigger",
            reason: "at least one alarm is required".to_string(),
        });
    }
    let relative = event
        .alarms()
        .iter()
        .any(|alarm| matches!(alarm.trigger, AlarmTrigger::Relative { .. }));
    if window.end.is_none() && relative && has_unbounded_rule(event) {
        return Err(AppError::InvalidArgument {
            argument: "end",
            reason: "relative alarms of an unbounded RRULE need --end".to_string(),
        });
    }

    let mut lines = Vec::new();
    for polled in event.poll_alarms(window.start.as_ref(), window.end.as_ref())? {
        let polled = polled?;
        let occurrence = polled
            .occurrence
            .as_ref()
            .map_or_else(|| "-".to_string(), |o| o.start().to_string());
        lines.push(format!(
            "{} {} {occurrence}",
            polled.trigger, polled.alarm.action
        ));
    }

    tracing::debug!(uid = %event.uid(), count = lines.len(), "Polled alarm triggers");
    Ok(lines)
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
