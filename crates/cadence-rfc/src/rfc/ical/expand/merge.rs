//! Merging of rule output and period lists into one occurrence stream.
//!
//! The stream keeps one lane per inclusion source (DTSTART, each RRULE, the
//! RDATE list) and one per exclusion source (each EXRULE, the EXDATE list).
//! Lanes are ascending, so the stream is a k-way merge: take the smallest
//! head, drop every lane head equal to it, and discard it if an exclusion
//! lane holds the same key.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::NaiveDateTime;

use super::error::RecurrenceResult;
use super::rule::RuleEvaluator;
use super::timezone::ResolveTimeZone;
use crate::rfc::ical::core::{DateTime, PeriodList, PeriodSpan};

/// Ordering and equality key of an occurrence.
///
/// Two values are the same occurrence only if they resolve to the same
/// instant and are both DATE or both DATE-TIME.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OccurrenceKey {
    pub instant: NaiveDateTime,
    pub date_only: bool,
}

impl OccurrenceKey {
    #[must_use]
    pub const fn new(instant: NaiveDateTime, date_only: bool) -> Self {
        Self { instant, date_only }
    }
}

/// A start value produced by one of the sources, with its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub key: OccurrenceKey,
    pub start: DateTime,
    /// Span of an explicit RDATE period.
    pub span: Option<PeriodSpan>,
}

impl Candidate {
    #[must_use]
    pub const fn new(key: OccurrenceKey, start: DateTime) -> Self {
        Self {
            key,
            start,
            span: None,
        }
    }
}

/// ## Summary
/// Folds a period list into ascending candidates.
///
/// Periods keep their span; instants carry none. Entries with the same key
/// collapse to the first one that has a span.
///
/// ## Errors
/// Returns `RecurrenceError::Conversion` if a zoned start cannot be resolved.
pub fn fold_periods(
    periods: &PeriodList,
    resolver: &dyn ResolveTimeZone,
) -> RecurrenceResult<VecDeque<Candidate>> {
    let mut candidates = periods
        .iter()
        .map(|period| -> RecurrenceResult<Candidate> {
            let instant = resolver.instant(&period.start)?;
            let key = OccurrenceKey::new(instant, period.start.is_date_only());
            Ok(Candidate {
                key,
                start: period.start.clone(),
                span: period.span.clone(),
            })
        })
        .collect::<RecurrenceResult<Vec<Candidate>>>()?;

    // Stable, so declaration order decides between equal keys.
    candidates.sort_by_key(|candidate| candidate.key);

    let mut folded: VecDeque<Candidate> = VecDeque::with_capacity(candidates.len());
    for candidate in candidates {
        match folded.back_mut() {
            Some(last) if last.key == candidate.key => {
                if last.span.is_none() {
                    last.span = candidate.span;
                }
            }
            _ => folded.push_back(candidate),
        }
    }
    Ok(folded)
}

/// One ascending source of candidates.
#[derive(Debug)]
enum Source {
    Rule(Box<RuleEvaluator>),
    Fixed(VecDeque<Candidate>),
}

#[derive(Debug)]
struct Lane {
    source: Source,
    head: Option<Candidate>,
    exhausted: bool,
}

impl Lane {
    fn new(source: Source) -> Self {
        Self {
            source,
            head: None,
            exhausted: false,
        }
    }

    /// Loads the head if needed and returns its key. `None` means the lane
    /// is exhausted or its rule is paused at the horizon.
    fn peek(&mut self) -> RecurrenceResult<Option<OccurrenceKey>> {
        if self.head.is_none() && !self.exhausted {
            match &mut self.source {
                Source::Rule(evaluator) => {
                    self.head = evaluator.next_candidate()?;
                    self.exhausted = self.head.is_none() && evaluator.is_exhausted();
                }
                Source::Fixed(candidates) => {
                    self.head = candidates.pop_front();
                    self.exhausted = self.head.is_none();
                }
            }
        }
        Ok(self.head.as_ref().map(|candidate| candidate.key))
    }

    fn set_horizon(&mut self, horizon: Option<NaiveDateTime>) {
        if let Source::Rule(evaluator) = &mut self.source {
            evaluator.set_horizon(horizon);
        }
    }
}

/// Lazy, deduplicated, ascending merge of inclusion and exclusion sources.
///
/// With a horizon set, the stream never hands out (or consumes) a candidate
/// at or after it, so it can be resumed after the horizon is extended.
#[derive(Debug)]
pub struct OccurrenceStream {
    included: Vec<Lane>,
    excluded: Vec<Lane>,
    horizon: Option<NaiveDateTime>,
    last: Option<OccurrenceKey>,
}

impl OccurrenceStream {
    /// ## Summary
    /// Builds a stream from its sources.
    ///
    /// `anchor` is DTSTART; it is an ordinary inclusion source that
    /// exclusions may remove.
    ///
    /// ## Errors
    /// Returns `RecurrenceError::Conversion` if DTSTART or a period start cannot
    /// be resolved.
    pub fn new(
        anchor: &DateTime,
        rules: Vec<RuleEvaluator>,
        exclusion_rules: Vec<RuleEvaluator>,
        rdates: &PeriodList,
        exdates: &PeriodList,
        resolver: &Arc<dyn ResolveTimeZone>,
    ) -> RecurrenceResult<Self> {
        let anchor_key = OccurrenceKey::new(resolver.instant(anchor)?, anchor.is_date_only());
        let anchor_lane = Source::Fixed(VecDeque::from([Candidate::new(anchor_key, anchor.clone())]));

        let mut included = vec![Lane::new(anchor_lane)];
        included.extend(
            rules
                .into_iter()
                .map(|rule| Lane::new(Source::Rule(Box::new(rule)))),
        );
        included.push(Lane::new(Source::Fixed(fold_periods(rdates, resolver.as_ref())?)));

        let mut excluded: Vec<Lane> = exclusion_rules
            .into_iter()
            .map(|rule| Lane::new(Source::Rule(Box::new(rule))))
            .collect();
        excluded.push(Lane::new(Source::Fixed(fold_periods(exdates, resolver.as_ref())?)));

        Ok(Self {
            included,
            excluded,
            horizon: None,
            last: None,
        })
    }

    /// Sets the exclusive instant the stream stops at. `None` lets the
    /// stream run until its sources are exhausted.
    pub fn set_horizon(&mut self, horizon: Option<NaiveDateTime>) {
        self.horizon = horizon;
        for lane in self.included.iter_mut().chain(self.excluded.iter_mut()) {
            lane.set_horizon(horizon);
        }
    }

    /// Returns whether every inclusion source is exhausted.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.included
            .iter()
            .all(|lane| lane.exhausted && lane.head.is_none())
    }

    /// ## Summary
    /// Returns the next occurrence before the horizon.
    ///
    /// `Ok(None)` means the stream is exhausted or the next occurrence lies at
    /// or after the horizon.
    ///
    /// ## Errors
    /// Propagates rule evaluation errors. Candidates already returned stay valid.
    pub fn next_candidate(&mut self) -> RecurrenceResult<Option<Candidate>> {
        loop {
            let mut smallest: Option<OccurrenceKey> = None;
            for lane in &mut self.included {
                if let Some(key) = lane.peek()? {
                    smallest = Some(smallest.map_or(key, |current| current.min(key)));
                }
            }

            let Some(key) = smallest else {
                return Ok(None);
            };
            if self.horizon.is_some_and(|horizon| key.instant >= horizon) {
                return Ok(None);
            }

            let mut taken: Option<Candidate> = None;
            for lane in &mut self.included {
                if lane.head.as_ref().is_some_and(|head| head.key == key) {
                    let Some(candidate) = lane.head.take() else {
                        continue;
                    };
                    match &mut taken {
                        None => taken = Some(candidate),
                        // An explicit RDATE span wins over a bare instant.
                        Some(current) if current.span.is_none() => current.span = candidate.span,
                        Some(_) => {}
                    }
                }
            }
            let Some(candidate) = taken else {
                continue;
            };

            if self.last.is_some_and(|last| key <= last) || self.is_excluded(key)? {
                continue;
            }

            self.last = Some(key);
            return Ok(Some(candidate));
        }
    }

    /// Advances every exclusion lane up to `key` and reports an exact match.
    fn is_excluded(&mut self, key: OccurrenceKey) -> RecurrenceResult<bool> {
        let mut excluded = false;
        for lane in &mut self.excluded {
            while let Some(head) = lane.peek()? {
                if head < key {
                    lane.head = None;
                } else {
                    excluded |= head == key;
                    break;
                }
            }
        }
        Ok(excluded)
    }
}
