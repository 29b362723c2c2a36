//! Five-field cron parsing and next-firing arithmetic.
//!
//! Wraps the `cron` crate the way `schedule::service::ScheduleService` does,
//! but pinned to UTC — this system carries no per-task timezone.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::errors::Error;

/// Parses a five-field cron expression, returning `Validation` on failure.
///
/// The `cron` crate expects a leading seconds field (and an optional
/// trailing year field); this system's wire format is the familiar
/// five-field minute-hour-day-month-weekday form, so a bare seconds field of
/// `0` is prepended before handing the expression to `Schedule::from_str`.
pub fn parse(expr: &str) -> Result<Schedule, Error> {
    let normalized = if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    };
    Schedule::from_str(&normalized)
        .map_err(|e| Error::Validation(format!("invalid cron expression: {e}")))
}

/// Returns the smallest instant strictly greater than `after` at which
/// `expr` matches.
pub fn next_after(expr: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>, Error> {
    let schedule = parse(expr)?;
    next_after_schedule(&schedule, after)
}

/// Same as [`next_after`] but operates on an already-parsed `Schedule`, for
/// callers (the scheduler's cron registry) that keep the parsed form around
/// rather than re-parsing on every tick.
pub fn next_after_schedule(schedule: &Schedule, after: DateTime<Utc>) -> Result<DateTime<Utc>, Error> {
    schedule
        .after(&after)
        .next()
        .ok_or_else(|| Error::Internal("cron expression has no future firing".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rejects_garbage_expression() {
        assert!(parse("not a cron").is_err());
    }

    #[test]
    fn accepts_five_field_expression() {
        assert!(parse("*/5 * * * *").is_ok());
        assert!(parse("0 9 * * *").is_ok());
    }

    #[test]
    fn every_five_minutes_steps_by_300_seconds() {
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let first = next_after("*/5 * * * *", after).unwrap();
        let second = next_after("*/5 * * * *", first).unwrap();
        assert_eq!((second - first).num_seconds(), 300);
    }

    #[test]
    fn every_minute_from_midday_fires_at_next_minute_boundary() {
        let at_noon = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let next = next_after("* * * * *", at_noon).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 12, 1, 0).unwrap());

        let thirty_secs_past = Utc.with_ymd_and_hms(2026, 1, 1, 12, 2, 30).unwrap();
        let next = next_after("* * * * *", thirty_secs_past).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 12, 3, 0).unwrap());
    }

    #[test]
    fn monotone_in_reference_time() {
        let now1 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let now2 = now1 + chrono::Duration::minutes(10);
        let expr = "0 */1 * * *";
        let next1 = next_after(expr, now1).unwrap();
        let next2 = next_after(expr, now2).unwrap();
        assert!(next2 >= next1);
    }

    #[test]
    fn next_run_is_correct_successor_of_its_own_parse() {
        let after = Utc.with_ymd_and_hms(2026, 3, 1, 8, 17, 0).unwrap();
        let expr = "*/5 * * * *";
        let next_run = next_after(expr, after).unwrap();
        let epsilon = chrono::Duration::milliseconds(1);
        let successor = next_after(expr, next_run - epsilon).unwrap();
        assert_eq!(successor, next_run);
    }
}
