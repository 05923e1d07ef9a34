//! Recurrence property serializer (RFC 5545 §3.8.2.4, §3.8.5).
//!
//! Writes DTSTART, RRULE, EXRULE, RDATE and EXDATE back out as folded
//! content lines, in that order.

use super::fold::fold_line;
use crate::rfc::ical::core::{DateTime, PeriodList, RRule};
use crate::rfc::ical::expand::Recurrence;

/// Serializes a rule to its RECUR value text.
#[must_use]
pub fn serialize_rrule(rule: &RRule) -> String {
    rule.to_string()
}

/// Serializes a period list to a comma-separated value, without parameters.
#[must_use]
pub fn serialize_period_list(periods: &PeriodList) -> String {
    periods.to_string()
}

/// Parameters a value needs to be read back as the same type and zone.
fn value_params(start: &DateTime, is_period: bool) -> String {
    let mut params = String::new();
    if is_period {
        params.push_str(";VALUE=PERIOD");
    } else if start.is_date_only() {
        params.push_str(";VALUE=DATE");
    }
    if let Some(tzid) = start.tzid() {
        params.push_str(";TZID=");
        params.push_str(tzid);
    }
    params
}

/// Serializes one date-valued property as a content line.
#[must_use]
pub fn serialize_date_property(name: &str, value: &DateTime) -> String {
    fold_line(&format!("{name}{}:{value}", value_params(value, false)))
}

/// Serializes a period list as one content line per period, so each entry
/// carries its own VALUE and TZID parameters.
#[must_use]
pub fn serialize_period_property(name: &str, periods: &PeriodList) -> String {
    periods
        .iter()
        .map(|period| {
            fold_line(&format!(
                "{name}{}:{period}",
                value_params(&period.start, !period.is_instant())
            ))
        })
        .collect()
}

/// Serializes the recurrence properties of an entity.
#[must_use]
pub fn serialize_recurrence(recurrence: &Recurrence) -> String {
    let mut out = serialize_date_property("DTSTART", recurrence.dtstart());
    for rule in recurrence.rrules() {
        out.push_str(&fold_line(&format!("RRULE:{}", serialize_rrule(rule))));
    }
    for rule in recurrence.exrules() {
        out.push_str(&fold_line(&format!("EXRULE:{}", serialize_rrule(rule))));
    }
    out.push_str(&serialize_period_property("RDATE", recurrence.rdates()));
    out.push_str(&serialize_period_property("EXDATE", recurrence.exdates()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfc::ical::core::{Duration, Period, Weekday, WeekdayNum};
    use crate::rfc::ical::parse::parse_period_list;

    fn ny(day: u32) -> DateTime {
        DateTime::zoned(2026, 1, day, 9, 0, 0, "America/New_York").unwrap()
    }

    #[test]
    fn serialize_recurrence_properties() {
        let mut recurrence = Recurrence::new(ny(5));
        recurrence
            .add_rrule(
                RRule::weekly()
                    .with_count(4)
                    .with_by_day(vec![WeekdayNum::every(Weekday::Monday)]),
            )
            .unwrap();
        recurrence.add_rdate(Period::with_duration(ny(7), Duration::hours(1)));
        recurrence.add_exdate(Period::instant(ny(12)));

        assert_eq!(
            serialize_recurrence(&recurrence),
            "DTSTART;TZID=America/New_York:20260105T090000\r\n\
             RRULE:FREQ=WEEKLY;COUNT=4;BYDAY=MO\r\n\
             RDATE;VALUE=PERIOD;TZID=America/New_York:20260107T090000/PT1H\r\n\
             EXDATE;TZID=America/New_York:20260112T090000\r\n"
        );
    }

    #[test]
    fn date_values_are_marked() {
        let date = DateTime::from_ymd(2026, 2, 1).unwrap();
        assert_eq!(
            serialize_date_property("DTSTART", &date),
            "DTSTART;VALUE=DATE:20260201\r\n"
        );
        assert_eq!(
            serialize_date_property("EXDATE", &DateTime::utc(2026, 2, 1, 8, 0, 0).unwrap()),
            "EXDATE:20260201T080000Z\r\n"
        );
    }

    #[test]
    fn period_list_value() {
        let list = PeriodList::from(vec![
            Period::instant(DateTime::from_ymd(2026, 2, 1).unwrap()),
            Period::with_end(ny(2), ny(3)),
        ]);
        assert_eq!(
            serialize_period_list(&list),
            "20260201,20260102T090000/20260103T090000"
        );
    }

    #[test]
    fn all_day_periods_read_back() {
        let day = DateTime::from_ymd(2026, 2, 1).unwrap();
        let list = PeriodList::from(vec![
            Period::with_duration(day.clone(), Duration::days(2)),
            Period::with_end(day, DateTime::from_ymd(2026, 2, 4).unwrap()),
        ]);
        let lines = serialize_period_property("RDATE", &list);
        assert_eq!(
            lines,
            "RDATE;VALUE=PERIOD:20260201/P2D\r\n\
             RDATE;VALUE=PERIOD:20260201/20260204\r\n"
        );

        for (line, expected) in lines.split("\r\n").zip(list.iter()) {
            let (_, value) = line.split_once(':').unwrap();
            let parsed = parse_period_list(value, None).unwrap();
            assert_eq!(parsed.as_slice(), std::slice::from_ref(expected));
        }
    }
}
