use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

use crate::limits::*;
use crate::model::{Recurrence, RecurrenceFreq, Span};

use super::EngineError;

pub(crate) fn validate_rule(anchor: &Span, rule: &Recurrence) -> Result<(), EngineError> {
    if rule.interval < MIN_RECURRENCE_INTERVAL || rule.interval > MAX_RECURRENCE_INTERVAL {
        return Err(EngineError::Validation(
            "recurrence interval must be between 1 and 30",
        ));
    }
    if rule.until <= anchor.start {
        return Err(EngineError::Validation(
            "recurrence end date must be after the first occurrence",
        ));
    }
    Ok(())
}

/// Expand a recurrence rule into the full, ordered occurrence list. The
/// anchor is always the first occurrence; every occurrence keeps the anchor's
/// duration. Generation stops once a start would pass `until` (a start equal
/// to `until` is still included) or at the hard cap — truncation at the cap
/// is silent, not an error.
///
/// Fully materialized on purpose: callers conflict-check the whole set before
/// committing any of it.
pub fn expand(anchor: &Span, rule: &Recurrence) -> Vec<Span> {
    let mut occurrences = Vec::new();
    let mut step: u32 = 0;
    loop {
        if occurrences.len() >= MAX_OCCURRENCES_PER_SERIES {
            break;
        }
        let start = occurrence_start(anchor.start, rule, step);
        if start > rule.until {
            break;
        }
        occurrences.push(anchor.with_start(start));
        step += 1;
    }
    occurrences
}

/// Start of occurrence `step` (0 = the anchor itself). Monthly stepping is
/// anchored: each occurrence is computed from the anchor date, not from the
/// previous occurrence, so a clamped month (Jan 31 → Feb 28) does not drag
/// later occurrences off the anchor's day-of-month.
fn occurrence_start(anchor: DateTime<Utc>, rule: &Recurrence, step: u32) -> DateTime<Utc> {
    let n = i64::from(rule.interval) * i64::from(step);
    match rule.freq {
        RecurrenceFreq::Daily => anchor + Duration::days(n),
        RecurrenceFreq::Weekly => anchor + Duration::days(7 * n),
        RecurrenceFreq::Monthly => add_months_clamped(anchor, n as i32),
    }
}

/// Calendar-month addition preserving time-of-day, with the day-of-month
/// clamped to the last valid day of the target month.
fn add_months_clamped(dt: DateTime<Utc>, months: i32) -> DateTime<Utc> {
    let total = dt.year() * 12 + dt.month0() as i32 + months;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    let day = dt.day().min(days_in_month(year, month));
    let date = NaiveDate::from_ymd_opt(year, month, day).expect("clamped day is valid");
    Utc.from_utc_datetime(&date.and_time(dt.time()))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => unreachable!("month out of range"),
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
