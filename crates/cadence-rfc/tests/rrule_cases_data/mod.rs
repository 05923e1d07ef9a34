use cadence_rfc::rfc::ical::expand::{EvaluationOptions, Recurrence, Window};
use cadence_rfc::rfc::ical::parse::{
    parse_date_or_datetime, parse_period_list, parse_rrule,
};
use cadence_rfc::rfc::ical::core::PeriodList;
use chrono::{DateTime, FixedOffset};
use rrule::RRuleSet;

pub struct RRuleCase {
    pub name: &'static str,
    pub rruleset: &'static str,
    pub expected: Option<&'static [&'static str]>,
    pub expected_len: Option<usize>,
    pub limit: u16,
}

#[expect(clippy::too_many_lines)]
pub fn rrule_cases() -> Vec<RRuleCase> {
    vec![
        RRuleCase {
            name: "daily_basic",
            rruleset: "DTSTART:20120201T093000Z\nRRULE:FREQ=DAILY;COUNT=3",
            expected: Some(&[
                "2012-02-01T09:30:00+00:00",
                "2012-02-02T09:30:00+00:00",
                "2012-02-03T09:30:00+00:00",
            ]),
            expected_len: None,
            limit: 100,
        },
        RRuleCase {
            name: "weekly_basic",
            rruleset: "DTSTART:19970902T090000Z\nRRULE:FREQ=WEEKLY;COUNT=3;BYDAY=TU,TH",
            expected: Some(&[
                "1997-09-02T09:00:00+00:00",
                "1997-09-04T09:00:00+00:00",
                "1997-09-09T09:00:00+00:00",
            ]),
            expected_len: None,
            limit: 100,
        },
        RRuleCase {
            name: "monthly_basic",
            rruleset: "DTSTART:20120101T090000Z\nRRULE:FREQ=MONTHLY;COUNT=3;BYMONTHDAY=1",
            expected: Some(&[
                "2012-01-01T09:00:00+00:00",
                "2012-02-01T09:00:00+00:00",
                "2012-03-01T09:00:00+00:00",
            ]),
            expected_len: None,
            limit: 100,
        },
        RRuleCase {
            name: "monthly_day_31_skips_short_months",
            rruleset: "DTSTART:20240131T090000Z\nRRULE:FREQ=MONTHLY;COUNT=4;BYMONTHDAY=31",
            expected: Some(&[
                "2024-01-31T09:00:00+00:00",
                "2024-03-31T09:00:00+00:00",
                "2024-05-31T09:00:00+00:00",
                "2024-07-31T09:00:00+00:00",
            ]),
            expected_len: None,
            limit: 100,
        },
        RRuleCase {
            name: "monthly_last_weekday",
            rruleset: "DTSTART:20240131T090000Z\nRRULE:FREQ=MONTHLY;COUNT=4;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=-1",
            expected: Some(&[
                "2024-01-31T09:00:00+00:00",
                "2024-02-29T09:00:00+00:00",
                "2024-03-29T09:00:00+00:00",
                "2024-04-30T09:00:00+00:00",
            ]),
            expected_len: None,
            limit: 100,
        },
        RRuleCase {
            name: "yearly_basic",
            rruleset: "DTSTART:20120101T090000Z\nRRULE:FREQ=YEARLY;COUNT=3",
            expected: Some(&[
                "2012-01-01T09:00:00+00:00",
                "2013-01-01T09:00:00+00:00",
                "2014-01-01T09:00:00+00:00",
            ]),
            expected_len: None,
            limit: 100,
        },
        RRuleCase {
            name: "yearly_weekno_monday",
            rruleset: "DTSTART:19970512T090000Z\nRRULE:FREQ=YEARLY;COUNT=3;BYWEEKNO=20;BYDAY=MO",
            expected: Some(&[
                "1997-05-12T09:00:00+00:00",
                "1998-05-11T09:00:00+00:00",
                "1999-05-17T09:00:00+00:00",
            ]),
            expected_len: None,
            limit: 100,
        },
        RRuleCase {
            name: "hourly_basic",
            rruleset: "DTSTART:20120101T090000Z\nRRULE:FREQ=HOURLY;COUNT=3",
            expected: Some(&[
                "2012-01-01T09:00:00+00:00",
                "2012-01-01T10:00:00+00:00",
                "2012-01-01T11:00:00+00:00",
            ]),
            expected_len: None,
            limit: 100,
        },
        RRuleCase {
            name: "minutely_basic",
            rruleset: "DTSTART:20120101T090000Z\nRRULE:FREQ=MINUTELY;COUNT=3",
            expected: Some(&[
                "2012-01-01T09:00:00+00:00",
                "2012-01-01T09:01:00+00:00",
                "2012-01-01T09:02:00+00:00",
            ]),
            expected_len: None,
            limit: 100,
        },
        RRuleCase {
            name: "secondly_basic",
            rruleset: "DTSTART:20120101T090000Z\nRRULE:FREQ=SECONDLY;COUNT=3",
            expected: Some(&[
                "2012-01-01T09:00:00+00:00",
                "2012-01-01T09:00:01+00:00",
                "2012-01-01T09:00:02+00:00",
            ]),
            expected_len: None,
            limit: 100,
        },
        RRuleCase {
            name: "rdate_exdate",
            rruleset: "DTSTART:20120201T093000Z\nRRULE:FREQ=DAILY;COUNT=3\nRDATE:20120210T093000Z\nEXDATE:20120202T093000Z",
            expected: Some(&[
                "2012-02-01T09:30:00+00:00",
                "2012-02-03T09:30:00+00:00",
                "2012-02-10T09:30:00+00:00",
            ]),
            expected_len: None,
            limit: 100,
        },
        RRuleCase {
            name: "dst_new_york",
            rruleset: "DTSTART;TZID=America/New_York:20210313T090000\nRRULE:FREQ=DAILY;COUNT=3",
            expected: Some(&[
                "2021-03-13T09:00:00-05:00",
                "2021-03-14T09:00:00-04:00",
                "2021-03-15T09:00:00-04:00",
            ]),
            expected_len: None,
            limit: 100,
        },
        RRuleCase {
            name: "monthly_second_to_last_monday",
            rruleset: "DTSTART;TZID=America/New_York:19970922T090000\nRRULE:FREQ=MONTHLY;COUNT=6;BYDAY=-2MO",
            expected: Some(&[
                "1997-09-22T09:00:00-04:00",
                "1997-10-20T09:00:00-04:00",
                "1997-11-17T09:00:00-05:00",
                "1997-12-22T09:00:00-05:00",
                "1998-01-19T09:00:00-05:00",
                "1998-02-16T09:00:00-05:00",
            ]),
            expected_len: None,
            limit: 100,
        },
        RRuleCase {
            name: "regression_issue_61",
            rruleset: "DTSTART;TZID=Europe/Berlin:18930401T010000\nRRULE:FREQ=DAILY",
            expected: None,
            expected_len: Some(10),
            limit: 10,
        },
        RRuleCase {
            name: "rfc_every_day_in_jan",
            rruleset: "DTSTART;TZID=America/New_York:19980101T090000\nRRULE:FREQ=YEARLY;UNTIL=20000131T140000Z;BYMONTH=1;BYDAY=SU,MO,TU,WE,TH,FR,SA",
            expected: None,
            expected_len: Some(93),
            limit: 200,
        },
        RRuleCase {
            name: "rfc_every_other_week_until",
            rruleset: "DTSTART;TZID=America/New_York:19970901T090000\nRRULE:FREQ=WEEKLY;INTERVAL=2;UNTIL=19971224T000000Z;WKST=SU;BYDAY=MO,WE,FR",
            expected: None,
            expected_len: Some(25),
            limit: 100,
        },
    ]
}

/// Splits `NAME;PARAM=VALUE:text` into the name, its TZID and the value text.
fn split_property(line: &str) -> (&str, Option<&str>, &str) {
    let (head, value) = line
        .split_once(':')
        .unwrap_or_else(|| panic!("Malformed content line {line}"));
    let mut parts = head.split(';');
    let name = parts.next().unwrap_or_default();
    let tzid = parts.find_map(|param| param.strip_prefix("TZID="));
    (name, tzid, value)
}

/// Builds a recurrence from `DTSTART`/`RRULE`/`EXRULE`/`RDATE`/`EXDATE` lines.
pub fn load_recurrence(text: &str) -> Recurrence {
    let mut dtstart = None;
    let mut rrules = Vec::new();
    let mut exrules = Vec::new();
    let mut rdates = PeriodList::new();
    let mut exdates = PeriodList::new();

    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        let (name, tzid, value) = split_property(line);
        match name {
            "DTSTART" => dtstart = Some(parse_date_or_datetime(value, tzid).unwrap()),
            "RRULE" => rrules.push(parse_rrule(value).unwrap()),
            "EXRULE" => exrules.push(parse_rrule(value).unwrap()),
            "RDATE" => rdates.extend(parse_period_list(value, tzid).unwrap()),
            "EXDATE" => exdates.extend(parse_period_list(value, tzid).unwrap()),
            other => panic!("Unexpected property {other}"),
        }
    }

    Recurrence::from_parts(
        dtstart.expect("DTSTART is required"),
        rrules,
        exrules,
        rdates,
        exdates,
        EvaluationOptions::default(),
    )
    .unwrap()
}

/// UTC timestamps of the first `limit` occurrences.
pub fn engine_timestamps(text: &str, limit: u16) -> Vec<i64> {
    let recurrence = load_recurrence(text);
    recurrence
        .candidates(&Window::unbounded())
        .unwrap()
        .take(usize::from(limit))
        .map(|candidate| candidate.unwrap().key.instant.and_utc().timestamp())
        .collect()
}

/// UTC timestamps the `rrule` crate produces for the same text.
pub fn oracle_timestamps(text: &str, limit: u16) -> Vec<i64> {
    let rrule_set: RRuleSet = text
        .parse()
        .unwrap_or_else(|err| panic!("rrule failed to parse {text}: {err}"));
    rrule_set
        .all(limit)
        .dates
        .iter()
        .map(chrono::DateTime::timestamp)
        .collect()
}

pub fn assert_case(case: &RRuleCase) {
    let actual = engine_timestamps(case.rruleset, case.limit);
    let oracle = oracle_timestamps(case.rruleset, case.limit);

    assert_eq!(actual, oracle, "Case {} differs from rrule", case.name);

    if let Some(expected) = case.expected {
        let expected_timestamps: Vec<i64> = expected
            .iter()
            .map(|value| parse_rfc3339(value).timestamp())
            .collect();
        assert_eq!(actual, expected_timestamps, "Case {} did not match", case.name);
    }

    if let Some(expected_len) = case.expected_len {
        assert_eq!(
            actual.len(),
            expected_len,
            "Case {} expected {} occurrences",
            case.name,
            expected_len
        );
    }
}

fn parse_rfc3339(value: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(value)
        .unwrap_or_else(|err| panic!("Failed to parse rfc3339 value {value}: {err}"))
}
