//! Incremental occurrence cache.
//!
//! The cache keeps every occurrence from its floor (the window start it was
//! built for) up to the furthest window end requested so far, together with
//! the paused stream that produced them. Later queries are served from the
//! stored prefix and resume the stream where it stopped. A query starting
//! before the floor rebuilds from DTSTART.

use chrono::NaiveDateTime;

use super::error::RecurrenceResult;
use super::merge::{Candidate, OccurrenceKey, OccurrenceStream};

#[derive(Debug)]
struct Evaluated {
    floor: Option<NaiveDateTime>,
    items: Vec<Candidate>,
    stream: OccurrenceStream,
    complete: bool,
}

#[derive(Debug, Default)]
enum CacheState {
    #[default]
    Empty,
    Evaluated(Box<Evaluated>),
}

/// Occurrence cache owned by one recurring entity.
#[derive(Debug, Default)]
pub struct OccurrenceCache {
    state: CacheState,
    generation: u64,
}

impl OccurrenceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops everything evaluated so far.
    pub fn reset(&mut self) {
        if matches!(self.state, CacheState::Evaluated(_)) {
            tracing::debug!(generation = self.generation, "Occurrence cache reset");
        }
        self.state = CacheState::Empty;
        self.generation += 1;
    }

    /// Changes whenever the cached sequence is rebuilt or dropped.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self.state, CacheState::Empty)
    }

    /// Number of occurrences currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.state {
            CacheState::Empty => 0,
            CacheState::Evaluated(evaluated) => evaluated.items.len(),
        }
    }

    /// Returns whether the cached range can answer a query starting at `start`.
    #[must_use]
    pub fn covers(&self, start: Option<NaiveDateTime>) -> bool {
        match &self.state {
            CacheState::Empty => false,
            CacheState::Evaluated(evaluated) => match (evaluated.floor, start) {
                (None, _) => true,
                (Some(floor), Some(start)) => floor <= start,
                (Some(_), None) => false,
            },
        }
    }

    /// ## Summary
    /// Makes the cache able to serve a query starting at `start`, building a
    /// fresh stream with `build` if the cached range does not reach back far
    /// enough.
    ///
    /// ## Errors
    /// Propagates errors from `build`; the cache is left empty.
    pub fn prepare<F>(&mut self, start: Option<NaiveDateTime>, build: F) -> RecurrenceResult<()>
    where
        F: FnOnce() -> RecurrenceResult<OccurrenceStream>,
    {
        if self.covers(start) {
            return Ok(());
        }
        if !self.is_empty() {
            tracing::debug!(?start, "Window starts before cached range, re-evaluating from DTSTART");
        }

        self.reset();
        let stream = build()?;
        self.state = CacheState::Evaluated(Box::new(Evaluated {
            floor: start,
            items: Vec::new(),
            stream,
            complete: false,
        }));
        Ok(())
    }

    /// Index of the first cached item after `after`, or at or after `start`
    /// when nothing has been handed out yet.
    #[must_use]
    pub fn position(&self, start: Option<NaiveDateTime>, after: Option<OccurrenceKey>) -> usize {
        let CacheState::Evaluated(evaluated) = &self.state else {
            return 0;
        };
        evaluated.items.partition_point(|item| match after {
            Some(after) => item.key <= after,
            None => start.is_some_and(|start| item.key.instant < start),
        })
    }

    /// ## Summary
    /// Returns the item at `index`, resuming the stream up to `end` if it has
    /// not been evaluated yet.
    ///
    /// `Ok(None)` means there is no occurrence at `index` before `end`.
    ///
    /// ## Errors
    /// Propagates evaluation errors. The cache is reset, so the next query
    /// starts over.
    pub fn get(
        &mut self,
        index: usize,
        end: Option<NaiveDateTime>,
    ) -> RecurrenceResult<Option<Candidate>> {
        let CacheState::Evaluated(evaluated) = &mut self.state else {
            return Ok(None);
        };

        if index >= evaluated.items.len() && !evaluated.complete {
            tracing::trace!(
                cached = evaluated.items.len(),
                ?end,
                "Resuming occurrence evaluation"
            );
        }

        while index >= evaluated.items.len() {
            if evaluated.complete {
                return Ok(None);
            }
            evaluated.stream.set_horizon(end);
            match evaluated.stream.next_candidate() {
                Ok(Some(candidate)) => {
                    if evaluated
                        .floor
                        .is_some_and(|floor| candidate.key.instant < floor)
                    {
                        continue;
                    }
                    evaluated.items.push(candidate);
                }
                Ok(None) => {
                    if evaluated.stream.is_exhausted() {
                        evaluated.complete = true;
                    }
                    return Ok(None);
                }
                Err(err) => {
                    self.reset();
                    return Err(err);
                }
            }
        }

        Ok(evaluated.items.get(index).cloned())
    }
}
