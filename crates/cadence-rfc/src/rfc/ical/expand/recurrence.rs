//! Recurrence definition of one entity and its occurrence queries.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDateTime;

use super::cache::OccurrenceCache;
use super::error::{RecurrenceError, RecurrenceResult};
use super::merge::{Candidate, OccurrenceKey, OccurrenceStream};
use super::options::{EvaluationOptions, Window};
use super::rule::RuleEvaluator;
use super::timezone::{ResolveTimeZone, TimeZoneResolver};
use crate::rfc::ical::core::{DateTime, Period, PeriodList, RRule};

/// DTSTART, RRULE, EXRULE, RDATE and EXDATE of a recurring entity, plus the
/// occurrence cache derived from them.
///
/// Fields are only reachable through methods. Every mutation validates its
/// input and drops the cache. Queries take `&self`; the cache sits behind a
/// mutex, so a shared `Recurrence` can be queried from several threads.
pub struct Recurrence {
    dtstart: DateTime,
    rrules: Vec<RRule>,
    exrules: Vec<RRule>,
    rdates: PeriodList,
    exdates: PeriodList,
    options: EvaluationOptions,
    resolver: Arc<dyn ResolveTimeZone>,
    cache: Mutex<OccurrenceCache>,
}

impl Recurrence {
    /// Creates a definition with only DTSTART, default options and the IANA resolver.
    #[must_use]
    pub fn new(dtstart: DateTime) -> Self {
        Self {
            dtstart,
            rrules: Vec::new(),
            exrules: Vec::new(),
            rdates: PeriodList::new(),
            exdates: PeriodList::new(),
            options: EvaluationOptions::default(),
            resolver: Arc::new(TimeZoneResolver::new()),
            cache: Mutex::new(OccurrenceCache::new()),
        }
    }

    /// ## Summary
    /// Rebuilds a definition from persisted fields. The cache starts empty.
    ///
    /// ## Errors
    /// Returns `InvalidRecurrence` if any rule fails validation under `options`.
    pub fn from_parts(
        dtstart: DateTime,
        rrules: Vec<RRule>,
        exrules: Vec<RRule>,
        rdates: PeriodList,
        exdates: PeriodList,
        options: EvaluationOptions,
    ) -> RecurrenceResult<Self> {
        for rule in rrules.iter().chain(&exrules) {
            rule.validate(options.validation)?;
        }
        Ok(Self {
            rrules,
            exrules,
            rdates,
            exdates,
            options,
            ..Self::new(dtstart)
        })
    }

    /// Replaces the timezone resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn ResolveTimeZone>) -> Self {
        self.resolver = resolver;
        self.invalidate();
        self
    }

    #[must_use]
    pub const fn dtstart(&self) -> &DateTime {
        &self.dtstart
    }

    #[must_use]
    pub fn rrules(&self) -> &[RRule] {
        &self.rrules
    }

    #[must_use]
    pub fn exrules(&self) -> &[RRule] {
        &self.exrules
    }

    #[must_use]
    pub const fn rdates(&self) -> &PeriodList {
        &self.rdates
    }

    #[must_use]
    pub const fn exdates(&self) -> &PeriodList {
        &self.exdates
    }

    #[must_use]
    pub const fn options(&self) -> &EvaluationOptions {
        &self.options
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<dyn ResolveTimeZone> {
        &self.resolver
    }

    /// Returns whether any source beyond DTSTART is present.
    #[must_use]
    pub fn is_recurring(&self) -> bool {
        !self.rrules.is_empty() || !self.rdates.is_empty()
    }

    pub fn set_dtstart(&mut self, dtstart: DateTime) {
        self.dtstart = dtstart;
        self.invalidate();
    }

    /// ## Summary
    /// Changes the evaluation options, re-validating every rule.
    ///
    /// ## Errors
    /// Returns `InvalidRecurrence` if a rule is not valid under the new options;
    /// the old options are kept.
    pub fn set_options(&mut self, options: EvaluationOptions) -> RecurrenceResult<()> {
        for rule in self.rrules.iter().chain(&self.exrules) {
            rule.validate(options.validation)?;
        }
        self.options = options;
        self.invalidate();
        Ok(())
    }

    /// ## Summary
    /// Adds an RRULE.
    ///
    /// ## Errors
    /// Returns `InvalidRecurrence` if the rule fails validation.
    pub fn add_rrule(&mut self, rule: RRule) -> RecurrenceResult<()> {
        rule.validate(self.options.validation)?;
        self.rrules.push(rule);
        self.invalidate();
        Ok(())
    }

    /// ## Summary
    /// Replaces all RRULEs.
    ///
    /// ## Errors
    /// Returns `InvalidRecurrence` if any rule fails validation; nothing changes.
    pub fn set_rrules(&mut self, rules: Vec<RRule>) -> RecurrenceResult<()> {
        for rule in &rules {
            rule.validate(self.options.validation)?;
        }
        self.rrules = rules;
        self.invalidate();
        Ok(())
    }

    /// ## Summary
    /// Adds an EXRULE.
    ///
    /// ## Errors
    /// Returns `InvalidRecurrence` if the rule fails validation.
    pub fn add_exrule(&mut self, rule: RRule) -> RecurrenceResult<()> {
        rule.validate(self.options.validation)?;
        self.exrules.push(rule);
        self.invalidate();
        Ok(())
    }

    /// ## Summary
    /// Replaces all EXRULEs.
    ///
    /// ## Errors
    /// Returns `InvalidRecurrence` if any rule fails validation; nothing changes.
    pub fn set_exrules(&mut self, rules: Vec<RRule>) -> RecurrenceResult<()> {
        for rule in &rules {
            rule.validate(self.options.validation)?;
        }
        self.exrules = rules;
        self.invalidate();
        Ok(())
    }

    pub fn add_rdate(&mut self, period: Period) {
        self.rdates.push(period);
        self.invalidate();
    }

    pub fn set_rdates(&mut self, rdates: PeriodList) {
        self.rdates = rdates;
        self.invalidate();
    }

    pub fn add_exdate(&mut self, period: Period) {
        self.exdates.push(period);
        self.invalidate();
    }

    pub fn set_exdates(&mut self, exdates: PeriodList) {
        self.exdates = exdates;
        self.invalidate();
    }

    /// ## Summary
    /// Re-checks the loaded rules and resets the cache. Called once after the
    /// fields have been filled from storage.
    ///
    /// ## Errors
    /// Returns `InvalidRecurrence` if a stored rule is not valid under the
    /// current options.
    pub fn rehydrate(&mut self) -> RecurrenceResult<()> {
        for rule in self.rrules.iter().chain(&self.exrules) {
            rule.validate(self.options.validation)?;
        }
        self.invalidate();
        Ok(())
    }

    fn invalidate(&mut self) {
        self.cache
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
    }

    fn lock_cache(&self) -> MutexGuard<'_, OccurrenceCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns whether nothing is cached.
    #[must_use]
    pub fn is_cache_empty(&self) -> bool {
        self.lock_cache().is_empty()
    }

    /// Number of cached occurrences.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.lock_cache().len()
    }

    /// Builds a fresh, uncached occurrence stream from DTSTART.
    fn build_stream(&self) -> RecurrenceResult<OccurrenceStream> {
        let evaluators = |rules: &[RRule]| {
            rules
                .iter()
                .map(|rule| {
                    RuleEvaluator::new(
                        rule.clone(),
                        self.dtstart.clone(),
                        Arc::clone(&self.resolver),
                        &self.options,
                    )
                })
                .collect::<RecurrenceResult<Vec<_>>>()
        };

        OccurrenceStream::new(
            &self.dtstart,
            evaluators(&self.rrules)?,
            evaluators(&self.exrules)?,
            &self.rdates,
            &self.exdates,
            &self.resolver,
        )
    }

    /// ## Summary
    /// Starts a query over `window`.
    ///
    /// ## Errors
    /// Returns `WindowOrder` if the window ends before it starts, or
    /// `Conversion` if a zoned bound cannot be resolved.
    pub fn cursor(&self, window: &Window) -> RecurrenceResult<Cursor> {
        let start = self.bound(window.start.as_ref())?;
        let end = self.bound(window.end.as_ref())?;

        if let (Some(s), Some(e)) = (start, end)
            && e < s
        {
            return Err(RecurrenceError::WindowOrder {
                start: window.start.as_ref().map(ToString::to_string).unwrap_or_default(),
                end: window.end.as_ref().map(ToString::to_string).unwrap_or_default(),
            });
        }

        Ok(Cursor {
            start,
            end,
            after: None,
            index: 0,
            generation: None,
            done: false,
        })
    }

    fn bound(&self, value: Option<&DateTime>) -> RecurrenceResult<Option<NaiveDateTime>> {
        value
            .map(|value| self.resolver.instant(value))
            .transpose()
            .map_err(RecurrenceError::from)
    }

    /// Returns the next occurrence start of a query, or `None` once the
    /// window is exhausted or an error has been returned.
    pub fn advance(&self, cursor: &mut Cursor) -> Option<RecurrenceResult<Candidate>> {
        if cursor.done {
            return None;
        }

        let mut cache = self.lock_cache();
        match self.advance_locked(&mut cache, cursor) {
            Ok(Some(candidate)) => Some(Ok(candidate)),
            Ok(None) => {
                cursor.done = true;
                None
            }
            Err(err) => {
                cursor.done = true;
                Some(Err(err))
            }
        }
    }

    fn advance_locked(
        &self,
        cache: &mut OccurrenceCache,
        cursor: &mut Cursor,
    ) -> RecurrenceResult<Option<Candidate>> {
        if cursor.generation != Some(cache.generation()) || cache.is_empty() {
            cache.prepare(cursor.start, || self.build_stream())?;
            cursor.index = cache.position(cursor.start, cursor.after);
            cursor.generation = Some(cache.generation());
        }

        loop {
            let Some(candidate) = cache.get(cursor.index, cursor.end)? else {
                return Ok(None);
            };
            cursor.index += 1;

            if cursor.end.is_some_and(|end| candidate.key.instant >= end) {
                return Ok(None);
            }
            if cursor.start.is_some_and(|start| candidate.key.instant < start)
                || cursor.after.is_some_and(|after| candidate.key <= after)
            {
                continue;
            }

            cursor.after = Some(candidate.key);
            return Ok(Some(candidate));
        }
    }

    /// ## Summary
    /// Iterates the occurrence starts in `window`, ascending.
    ///
    /// ## Errors
    /// Returns `WindowOrder` or `Conversion` for a bad window. Evaluation errors
    /// are yielded by the iterator.
    pub fn candidates(&self, window: &Window) -> RecurrenceResult<Candidates<'_>> {
        Ok(Candidates {
            recurrence: self,
            cursor: self.cursor(window)?,
        })
    }
}

impl Clone for Recurrence {
    /// The clone starts with an empty cache.
    fn clone(&self) -> Self {
        Self {
            dtstart: self.dtstart.clone(),
            rrules: self.rrules.clone(),
            exrules: self.exrules.clone(),
            rdates: self.rdates.clone(),
            exdates: self.exdates.clone(),
            options: self.options,
            resolver: Arc::clone(&self.resolver),
            cache: Mutex::new(OccurrenceCache::new()),
        }
    }
}

impl fmt::Debug for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recurrence")
            .field("dtstart", &self.dtstart)
            .field("rrules", &self.rrules)
            .field("exrules", &self.exrules)
            .field("rdates", &self.rdates)
            .field("exdates", &self.exdates)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Position of one query within a [`Recurrence`].
///
/// A cursor survives cache rebuilds caused by other queries: it re-locates
/// itself after the last key it returned.
#[derive(Debug, Clone)]
pub struct Cursor {
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    after: Option<OccurrenceKey>,
    index: usize,
    generation: Option<u64>,
    done: bool,
}

/// Iterator over occurrence starts of a [`Recurrence`].
#[derive(Debug)]
pub struct Candidates<'a> {
    recurrence: &'a Recurrence,
    cursor: Cursor,
}

impl Iterator for Candidates<'_> {
    type Item = RecurrenceResult<Candidate>;

    fn next(&mut self) -> Option<Self::Item> {
        self.recurrence.advance(&mut self.cursor)
    }
}

#[cfg(test)]
#[path = "recurrence_tests.rs"]
mod tests;
