//! Cron expression handling.
//!
//! Triggers carry 5-field expressions plus an optional IANA timezone. The
//! builder splices the timezone in as a `CRON_TZ=<zone>` prefix; the parser
//! strips that prefix back out, resolves the zone, and normalizes the field
//! count to the seconds-first form the `cron` crate parses.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::SchedulerError;

const CRON_TZ_PREFIX: &str = "CRON_TZ=";

/// Combine a trigger's schedule and timezone into a single expression.
pub fn build_expression(schedule: &str, timezone: Option<&str>) -> String {
  match timezone {
    Some(zone) if !zone.is_empty() => format!("{CRON_TZ_PREFIX}{zone} {schedule}"),
    _ => schedule.to_string(),
  }
}

/// Parse an expression (with optional `CRON_TZ=` prefix) into a compiled
/// schedule and its zone. 5-field expressions get a `0` seconds field
/// prepended; 6- and 7-field expressions pass through.
pub fn parse_schedule(expression: &str) -> Result<(Schedule, Tz), SchedulerError> {
  let expression = expression.trim();

  let (timezone, rest) = match expression.strip_prefix(CRON_TZ_PREFIX) {
    Some(tail) => {
      let (zone, rest) = tail.split_once(char::is_whitespace).ok_or_else(|| {
        SchedulerError::InvalidExpression {
          expression: expression.to_string(),
          message: "CRON_TZ prefix without a schedule".to_string(),
        }
      })?;
      let tz = Tz::from_str(zone).map_err(|_| SchedulerError::UnknownTimezone(zone.to_string()))?;
      (tz, rest.trim())
    }
    None => (Tz::UTC, expression),
  };

  let fields = rest.split_whitespace().count();
  let normalized = match fields {
    5 => format!("0 {rest}"),
    6 | 7 => rest.to_string(),
    _ => {
      return Err(SchedulerError::InvalidExpression {
        expression: expression.to_string(),
        message: format!("expected 5 fields, found {fields}"),
      });
    }
  };

  let schedule = Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidExpression {
    expression: expression.to_string(),
    message: e.to_string(),
  })?;

  Ok((schedule, timezone))
}

/// The next fire time strictly after `after`, in UTC.
pub fn next_fire(schedule: &Schedule, timezone: Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
  schedule
    .after(&after.with_timezone(&timezone))
    .next()
    .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_five_field_expression_parses() {
    let (_, tz) = parse_schedule("30 9 * * *").unwrap();
    assert_eq!(tz, Tz::UTC);
  }

  #[test]
  fn test_cron_tz_prefix_round_trip() {
    let built = build_expression("30 9 * * *", Some("Europe/Istanbul"));
    assert_eq!(built, "CRON_TZ=Europe/Istanbul 30 9 * * *");
    let (_, tz) = parse_schedule(&built).unwrap();
    assert_eq!(tz, Tz::Europe__Istanbul);
  }

  #[test]
  fn test_no_timezone_builds_bare_expression() {
    assert_eq!(build_expression("* * * * *", None), "* * * * *");
  }

  #[test]
  fn test_unknown_timezone_is_an_error() {
    let err = parse_schedule("CRON_TZ=Mars/Olympus 30 9 * * *").unwrap_err();
    assert!(matches!(err, SchedulerError::UnknownTimezone(_)));
  }

  #[test]
  fn test_wrong_field_count_is_an_error() {
    let err = parse_schedule("30 9 *").unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidExpression { .. }));
  }

  #[test]
  fn test_six_field_expression_passes_through() {
    assert!(parse_schedule("*/5 * * * * *").is_ok());
  }

  #[test]
  fn test_next_fire_respects_timezone() {
    // 09:30 in Istanbul (UTC+3) is 06:30 UTC.
    let (schedule, tz) = parse_schedule("CRON_TZ=Europe/Istanbul 30 9 * * *").unwrap();
    let after = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let next = next_fire(&schedule, tz, after).unwrap();
    assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 1, 6, 30, 0).unwrap());
  }

  #[test]
  fn test_next_fire_in_utc_without_zone() {
    let (schedule, tz) = parse_schedule("30 9 * * *").unwrap();
    let after = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let next = next_fire(&schedule, tz, after).unwrap();
    assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap());
  }
}
