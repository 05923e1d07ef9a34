//! Rule evaluation checked against the `rrule` crate.

mod rrule_cases_data;

use rrule_cases_data::{assert_case, rrule_cases};

#[test_log::test]
fn test_rrule_cases_match_oracle() {
    for case in rrule_cases() {
        assert_case(&case);
    }
}
