//! Recurring iCalendar components (RFC 5545 §3.6.1-3.6.3).
//!
//! `VEVENT`, `VTODO` and `VJOURNAL` share one capability, [`HasRecurrence`],
//! instead of a common base type. [`RecurringComponent`] is the tagged union
//! used where the kind is only known at runtime.

use std::cmp::Ordering;

use super::{Alarm, DateTime, Duration};
use crate::rfc::ical::expand::{
    AlarmOccurrences, Occurrences, Recurrence, RecurrenceResult, Window,
};

/// Component kind of a recurring entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// VEVENT component.
    Event,
    /// VTODO component.
    Todo,
    /// VJOURNAL component.
    Journal,
}

impl ComponentKind {
    /// Returns the string name for this component kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Event => "VEVENT",
            Self::Todo => "VTODO",
            Self::Journal => "VJOURNAL",
        }
    }

    /// Parses a component kind from a string (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "VEVENT" => Some(Self::Event),
            "VTODO" => Some(Self::Todo),
            "VJOURNAL" => Some(Self::Journal),
            _ => None,
        }
    }

    /// Returns whether components of this kind may carry VALARMs.
    #[must_use]
    pub const fn can_have_alarms(self) -> bool {
        matches!(self, Self::Event | Self::Todo)
    }
}

/// Descriptive properties shared by all recurring components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
    pub uid: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub categories: Vec<String>,
    /// PRIORITY, 0 (undefined) to 9.
    pub priority: Option<u8>,
    pub sequence: u32,
    pub recurrence_id: Option<DateTime>,
}

impl ComponentInfo {
    /// Creates descriptive properties with a freshly generated UID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_uid(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            summary: None,
            description: None,
            categories: Vec::new(),
            priority: None,
            sequence: 0,
            recurrence_id: None,
        }
    }
}

impl Default for ComponentInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// How the extent of each occurrence is declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentEnd {
    /// DTEND (events) or DUE (to-dos).
    At(DateTime),
    /// DURATION.
    Duration(Duration),
}

/// Capability shared by every component that owns a recurrence definition.
pub trait HasRecurrence {
    fn kind(&self) -> ComponentKind;

    fn uid(&self) -> &str;

    fn recurrence(&self) -> &Recurrence;

    /// Mutable access to DTSTART and the rule and date lists. Every mutation
    /// drops the occurrence cache.
    fn recurrence_mut(&mut self) -> &mut Recurrence;

    /// Extent applied to each occurrence that has no explicit RDATE span.
    fn duration(&self) -> Option<Duration>;

    fn alarms(&self) -> &[Alarm];

    /// ## Summary
    /// Lazily enumerates the occurrences in `window`, ascending.
    ///
    /// ## Errors
    /// Returns `WindowOrder` if the window ends before it starts. Evaluation
    /// errors are yielded by the iterator.
    fn get_occurrences(&self, window: &Window) -> RecurrenceResult<Occurrences<'_>>
    where
        Self: Sized,
    {
        Occurrences::new(self, window)
    }

    /// ## Summary
    /// Lazily enumerates alarm triggers in `[start, end)`, alarm by alarm.
    ///
    /// ## Errors
    /// Returns `WindowOrder` if `end` precedes `start`.
    fn poll_alarms(
        &self,
        start: Option<&DateTime>,
        end: Option<&DateTime>,
    ) -> RecurrenceResult<AlarmOccurrences<'_>>
    where
        Self: Sized,
    {
        AlarmOccurrences::new(self, start, end)
    }
}

/// Duration of each occurrence derived from DTSTART and DTEND/DUE/DURATION.
fn effective_duration(recurrence: &Recurrence, end: Option<&ComponentEnd>) -> Option<Duration> {
    let start = recurrence.dtstart();
    match end {
        Some(ComponentEnd::Duration(duration)) => Some(*duration),
        Some(ComponentEnd::At(end)) => {
            let delta = if start.form() == end.form() {
                end.local() - start.local()
            } else {
                let resolver = recurrence.resolver();
                resolver.instant(end).ok()? - resolver.instant(start).ok()?
            };
            Duration::from_time_delta(delta)
        }
        // RFC 5545 §3.6.1: an all-day event without DTEND lasts one day.
        None if start.is_date_only() => Some(Duration::days(1)),
        None => None,
    }
}

/// A VEVENT.
#[derive(Debug, Clone)]
pub struct Event {
    pub info: ComponentInfo,
    pub alarms: Vec<Alarm>,
    recurrence: Recurrence,
    end: Option<ComponentEnd>,
}

impl Event {
    #[must_use]
    pub fn new(dtstart: DateTime) -> Self {
        Self::from_recurrence(Recurrence::new(dtstart))
    }

    /// Wraps an existing recurrence definition.
    #[must_use]
    pub fn from_recurrence(recurrence: Recurrence) -> Self {
        Self {
            info: ComponentInfo::new(),
            alarms: Vec::new(),
            recurrence,
            end: None,
        }
    }

    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.info.uid = uid.into();
        self
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.info.summary = Some(summary.into());
        self
    }

    /// Sets DTEND, replacing any DURATION.
    #[must_use]
    pub fn with_end(mut self, dtend: DateTime) -> Self {
        self.end = Some(ComponentEnd::At(dtend));
        self
    }

    /// Sets DURATION, replacing any DTEND.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.end = Some(ComponentEnd::Duration(duration));
        self
    }

    #[must_use]
    pub fn with_alarm(mut self, alarm: Alarm) -> Self {
        self.alarms.push(alarm);
        self
    }

    #[must_use]
    pub const fn end(&self) -> Option<&ComponentEnd> {
        self.end.as_ref()
    }

    pub fn set_end(&mut self, end: Option<ComponentEnd>) {
        self.end = end;
    }
}

impl HasRecurrence for Event {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Event
    }

    fn uid(&self) -> &str {
        &self.info.uid
    }

    fn recurrence(&self) -> &Recurrence {
        &self.recurrence
    }

    fn recurrence_mut(&mut self) -> &mut Recurrence {
        &mut self.recurrence
    }

    fn duration(&self) -> Option<Duration> {
        effective_duration(&self.recurrence, self.end.as_ref())
    }

    fn alarms(&self) -> &[Alarm] {
        &self.alarms
    }
}

/// A VTODO. DUE plays the role DTEND plays for events.
#[derive(Debug, Clone)]
pub struct Todo {
    pub info: ComponentInfo,
    pub alarms: Vec<Alarm>,
    /// COMPLETED time, if the to-do is done.
    pub completed: Option<DateTime>,
    recurrence: Recurrence,
    due: Option<ComponentEnd>,
}

impl Todo {
    #[must_use]
    pub fn new(dtstart: DateTime) -> Self {
        Self {
            info: ComponentInfo::new(),
            alarms: Vec::new(),
            completed: None,
            recurrence: Recurrence::new(dtstart),
            due: None,
        }
    }

    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.info.uid = uid.into();
        self
    }

    /// Sets DUE, replacing any DURATION.
    #[must_use]
    pub fn with_due(mut self, due: DateTime) -> Self {
        self.due = Some(ComponentEnd::At(due));
        self
    }

    /// Sets DURATION, replacing any DUE.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.due = Some(ComponentEnd::Duration(duration));
        self
    }

    #[must_use]
    pub fn with_alarm(mut self, alarm: Alarm) -> Self {
        self.alarms.push(alarm);
        self
    }

    #[must_use]
    pub const fn due(&self) -> Option<&ComponentEnd> {
        self.due.as_ref()
    }

    pub fn set_due(&mut self, due: Option<ComponentEnd>) {
        self.due = due;
    }
}

impl HasRecurrence for Todo {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Todo
    }

    fn uid(&self) -> &str {
        &self.info.uid
    }

    fn recurrence(&self) -> &Recurrence {
        &self.recurrence
    }

    fn recurrence_mut(&mut self) -> &mut Recurrence {
        &mut self.recurrence
    }

    fn duration(&self) -> Option<Duration> {
        effective_duration(&self.recurrence, self.due.as_ref())
    }

    fn alarms(&self) -> &[Alarm] {
        &self.alarms
    }
}

/// A VJOURNAL. Journals have no extent and no alarms.
#[derive(Debug, Clone)]
pub struct Journal {
    pub info: ComponentInfo,
    recurrence: Recurrence,
}

impl Journal {
    #[must_use]
    pub fn new(dtstart: DateTime) -> Self {
        Self {
            info: ComponentInfo::new(),
            recurrence: Recurrence::new(dtstart),
        }
    }

    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.info.uid = uid.into();
        self
    }
}

impl HasRecurrence for Journal {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Journal
    }

    fn uid(&self) -> &str {
        &self.info.uid
    }

    fn recurrence(&self) -> &Recurrence {
        &self.recurrence
    }

    fn recurrence_mut(&mut self) -> &mut Recurrence {
        &mut self.recurrence
    }

    fn duration(&self) -> Option<Duration> {
        self.recurrence
            .dtstart()
            .is_date_only()
            .then_some(Duration::days(1))
    }

    fn alarms(&self) -> &[Alarm] {
        &[]
    }
}

/// Any recurring component.
#[derive(Debug, Clone)]
pub enum RecurringComponent {
    Event(Event),
    Todo(Todo),
    Journal(Journal),
}

impl RecurringComponent {
    fn inner(&self) -> &dyn HasRecurrence {
        match self {
            Self::Event(event) => event,
            Self::Todo(todo) => todo,
            Self::Journal(journal) => journal,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn HasRecurrence {
        match self {
            Self::Event(event) => event,
            Self::Todo(todo) => todo,
            Self::Journal(journal) => journal,
        }
    }

    #[must_use]
    pub const fn info(&self) -> &ComponentInfo {
        match self {
            Self::Event(event) => &event.info,
            Self::Todo(todo) => &todo.info,
            Self::Journal(journal) => &journal.info,
        }
    }

    /// ## Summary
    /// Finishes loading a component from storage: re-checks its rules
    /// and resets the occurrence cache.
    ///
    /// ## Errors
    /// Returns `InvalidRecurrence` if a stored rule is not valid.
    pub fn rehydrate(&mut self) -> RecurrenceResult<()> {
        tracing::trace!(uid = %self.uid(), kind = self.kind().as_str(), "Rehydrating component");
        self.recurrence_mut().rehydrate()
    }
}

impl HasRecurrence for RecurringComponent {
    fn kind(&self) -> ComponentKind {
        self.inner().kind()
    }

    fn uid(&self) -> &str {
        self.inner().uid()
    }

    fn recurrence(&self) -> &Recurrence {
        self.inner().recurrence()
    }

    fn recurrence_mut(&mut self) -> &mut Recurrence {
        self.inner_mut().recurrence_mut()
    }

    fn duration(&self) -> Option<Duration> {
        self.inner().duration()
    }

    fn alarms(&self) -> &[Alarm] {
        self.inner().alarms()
    }
}

impl From<Event> for RecurringComponent {
    fn from(event: Event) -> Self {
        Self::Event(event)
    }
}

impl From<Todo> for RecurringComponent {
    fn from(todo: Todo) -> Self {
        Self::Todo(todo)
    }
}

impl From<Journal> for RecurringComponent {
    fn from(journal: Journal) -> Self {
        Self::Journal(journal)
    }
}

/// Orders components by the instant of their DTSTART. A start the resolver
/// cannot place is ordered by its wall-clock reading.
pub fn sort_by_start<T: HasRecurrence>(components: &mut [T]) {
    let start = |component: &T| {
        let recurrence = component.recurrence();
        let dtstart = recurrence.dtstart();
        recurrence
            .resolver()
            .instant(dtstart)
            .unwrap_or_else(|_| dtstart.local())
    };
    components.sort_by(|a, b| match start(a).cmp(&start(b)) {
        Ordering::Equal => a.uid().cmp(b.uid()),
        other => other,
    });
}
