//! VALARM model (RFC 5545 §3.6.6).

use std::fmt;

use super::{DateTime, Duration};

/// Action taken when an alarm fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmAction {
    Audio,
    Display,
    Email,
}

impl AlarmAction {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "AUDIO",
            Self::Display => "DISPLAY",
            Self::Email => "EMAIL",
        }
    }

    /// Parses an action name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "AUDIO" => Self::Audio,
            "DISPLAY" => Self::Display,
            "EMAIL" => Self::Email,
            _ => return None,
        })
    }
}

impl fmt::Display for AlarmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which edge of an occurrence a relative trigger is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TriggerRelation {
    #[default]
    Start,
    End,
}

/// TRIGGER property value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AlarmTrigger {
    /// Signed offset from the start or end of each occurrence.
    Relative {
        offset: Duration,
        related: TriggerRelation,
    },
    /// Fixed trigger time, independent of occurrences.
    Absolute(DateTime),
}

impl AlarmTrigger {
    /// Trigger at `offset` before or after the occurrence start.
    #[must_use]
    pub const fn before_start(offset: Duration) -> Self {
        Self::Relative {
            offset: offset.negate(),
            related: TriggerRelation::Start,
        }
    }
}

/// REPEAT and DURATION of an alarm. Both must be present together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlarmRepeat {
    /// Number of additional triggers after the first.
    pub count: u32,
    /// Delay between consecutive triggers.
    pub interval: Duration,
}

/// A VALARM attached to a recurring component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub action: AlarmAction,
    pub trigger: AlarmTrigger,
    pub repeat: Option<AlarmRepeat>,
    pub description: Option<String>,
    pub summary: Option<String>,
}

impl Alarm {
    /// Creates an alarm with no repetition and no text.
    #[must_use]
    pub const fn new(action: AlarmAction, trigger: AlarmTrigger) -> Self {
        Self {
            action,
            trigger,
            repeat: None,
            description: None,
            summary: None,
        }
    }

    /// Creates a DISPLAY alarm with a description.
    #[must_use]
    pub fn display(trigger: AlarmTrigger, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::new(AlarmAction::Display, trigger)
        }
    }

    /// Sets the repetition.
    #[must_use]
    pub const fn with_repeat(mut self, count: u32, interval: Duration) -> Self {
        self.repeat = Some(AlarmRepeat { count, interval });
        self
    }

    /// Sets the summary (used by EMAIL alarms).
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}
