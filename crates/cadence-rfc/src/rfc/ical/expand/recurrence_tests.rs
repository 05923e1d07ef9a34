//! Tests for occurrence queries and the entity-owned cache.

use super::*;
use crate::rfc::ical::core::Validation;

fn at(day: u32) -> DateTime {
    DateTime::floating(2026, 1, day, 9, 0, 0).unwrap()
}

fn daily() -> Recurrence {
    let mut recurrence = Recurrence::new(at(1));
    recurrence.add_rrule(RRule::daily()).unwrap();
    recurrence
}

fn starts(recurrence: &Recurrence, window: &Window) -> Vec<String> {
    recurrence
        .candidates(window)
        .unwrap()
        .map(|candidate| candidate.unwrap().start.to_string())
        .collect()
}

#[test]
fn test_dtstart_without_rules_is_single_occurrence() {
    let recurrence = Recurrence::new(at(1));
    assert_eq!(starts(&recurrence, &Window::unbounded()), ["20260101T090000"]);
    assert!(!recurrence.is_recurring());
}

#[test]
fn test_window_is_half_open() {
    let recurrence = daily();
    assert_eq!(
        starts(&recurrence, &Window::between(at(3), at(6))),
        ["20260103T090000", "20260104T090000", "20260105T090000"]
    );
}

#[test]
fn test_window_order_error() {
    let recurrence = daily();
    let err = recurrence
        .candidates(&Window::between(at(6), at(3)))
        .unwrap_err();
    assert!(matches!(err, RecurrenceError::WindowOrder { .. }));
}

#[test_log::test]
fn test_widening_window_matches_single_query() {
    let widened = daily();
    let first = starts(&widened, &Window::between(at(1), at(11)));
    let second = starts(&widened, &Window::between(at(1), at(21)));

    let direct = starts(&daily(), &Window::between(at(1), at(21)));

    assert_eq!(first.len(), 10);
    assert_eq!(second, direct);
    assert_eq!(&second[..10], first.as_slice());
}

#[test]
fn test_contained_window_is_served_from_cache() {
    let recurrence = daily();
    starts(&recurrence, &Window::between(at(1), at(11)));
    assert_eq!(recurrence.cached_len(), 10);

    let inner = starts(&recurrence, &Window::between(at(3), at(5)));
    assert_eq!(inner, ["20260103T090000", "20260104T090000"]);
    assert_eq!(recurrence.cached_len(), 10);
}

#[test]
fn test_earlier_window_start_rebuilds_from_dtstart() {
    let recurrence = daily();
    starts(&recurrence, &Window::between(at(5), at(8)));
    assert_eq!(recurrence.cached_len(), 3);

    let earlier = starts(&recurrence, &Window::between(at(2), at(4)));
    assert_eq!(earlier, ["20260102T090000", "20260103T090000"]);
}

#[test]
fn test_mutation_discards_cache() {
    let mut recurrence = daily();
    starts(&recurrence, &Window::between(at(1), at(5)));
    assert!(!recurrence.is_cache_empty());

    recurrence.add_exdate(Period::instant(at(2)));
    assert!(recurrence.is_cache_empty());
    assert_eq!(
        starts(&recurrence, &Window::between(at(1), at(5))),
        ["20260101T090000", "20260103T090000", "20260104T090000"]
    );
}

#[test]
fn test_interleaved_queries_stay_consistent() {
    let recurrence = daily();
    let mut late = recurrence
        .candidates(&Window::between(at(10), at(13)))
        .unwrap();
    let first_late = late.next().unwrap().unwrap();

    // Starting earlier rebuilds the cache under the first query.
    let early = starts(&recurrence, &Window::between(at(1), at(3)));
    assert_eq!(early, ["20260101T090000", "20260102T090000"]);

    let rest: Vec<String> = late.map(|c| c.unwrap().start.to_string()).collect();
    assert_eq!(first_late.start.to_string(), "20260110T090000");
    assert_eq!(rest, ["20260111T090000", "20260112T090000"]);
}

#[test]
fn test_early_termination_is_lazy() {
    let recurrence = daily();
    let first_three: Vec<_> = recurrence
        .candidates(&Window::unbounded())
        .unwrap()
        .take(3)
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(first_three.len(), 3);
    assert_eq!(recurrence.cached_len(), 3);
}

#[test_log::test]
fn test_safety_error_aborts_query_and_resets_cache() {
    let mut recurrence = Recurrence::new(DateTime::from_ymd(2026, 1, 1).unwrap());
    recurrence
        .set_options(EvaluationOptions::default().with_max_empty_periods(24))
        .unwrap();
    recurrence
        .add_rrule(
            RRule::monthly()
                .with_by_month(vec![2])
                .with_by_monthday(vec![30]),
        )
        .unwrap();

    let mut unbounded = recurrence.candidates(&Window::unbounded()).unwrap();
    assert!(matches!(
        unbounded.next(),
        Some(Err(RecurrenceError::EvaluationSafetyLimitExceeded { .. }))
    ));
    assert!(unbounded.next().is_none());
    assert!(recurrence.is_cache_empty());

    // With a window end the same rule simply yields DTSTART.
    let window = Window::until(DateTime::from_ymd(2040, 1, 1).unwrap());
    assert_eq!(starts(&recurrence, &window), ["20260101"]);
}

#[test]
fn test_invalid_rules_are_rejected_without_change() {
    let mut recurrence = Recurrence::new(at(1));
    assert!(recurrence.add_rrule(RRule::daily().with_interval(0)).is_err());
    assert!(recurrence.rrules().is_empty());

    let both = RRule::daily().with_count(3).with_until(at(10));
    assert!(recurrence.add_rrule(both.clone()).is_err());

    recurrence
        .set_options(EvaluationOptions::default().with_validation(Validation::Lenient))
        .unwrap();
    recurrence.add_rrule(both).unwrap();
    assert_eq!(starts(&recurrence, &Window::unbounded()).len(), 3);

    // Going back to strict is refused while the lenient rule is attached.
    assert!(recurrence.set_options(EvaluationOptions::default()).is_err());
}

#[test]
fn test_from_parts_and_rehydrate() {
    let mut recurrence = Recurrence::from_parts(
        at(1),
        vec![RRule::daily().with_count(5)],
        Vec::new(),
        PeriodList::new(),
        PeriodList::from(vec![Period::instant(at(3))]),
        EvaluationOptions::default(),
    )
    .unwrap();

    assert_eq!(starts(&recurrence, &Window::unbounded()).len(), 4);
    recurrence.rehydrate().unwrap();
    assert!(recurrence.is_cache_empty());

    let invalid = Recurrence::from_parts(
        at(1),
        vec![RRule::daily().with_by_month(vec![0])],
        Vec::new(),
        PeriodList::new(),
        PeriodList::new(),
        EvaluationOptions::default(),
    );
    assert!(invalid.is_err());
}

#[test]
fn test_clone_starts_with_empty_cache() {
    let recurrence = daily();
    starts(&recurrence, &Window::between(at(1), at(5)));

    let copy = recurrence.clone();
    assert!(copy.is_cache_empty());
    assert_eq!(
        starts(&copy, &Window::between(at(1), at(5))),
        starts(&recurrence, &Window::between(at(1), at(5)))
    );
}

#[test]
fn test_shared_queries_across_threads() {
    let recurrence = daily();
    let window = Window::between(at(1), at(15));
    let expected = starts(&daily(), &window);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| starts(&recurrence, &window)))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}
